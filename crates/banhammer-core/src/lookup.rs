//! Ban Lookup
//!
//! Synchronous check on the request path: is the caller's IP or key banned,
//! and for how long. Reads only the most recently completed ban table.

use serde::Serialize;
use std::sync::Arc;

use banhammer_types::{ban_adapter::BanAdapter, types::non_empty};

use crate::config::ignore_rate_limits_from_env;
use crate::prelude::*;

/// Retry hint used when the ban table is unreachable and the policy is to
/// reject requests
pub const DEFAULT_FAIL_CLOSED_RETRY_MS: i64 = 5_000;

/// Outcome of a lookup, as reported to the serving process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
	pub limited: bool,
	pub retry_after_ms: i64,
}

impl RateLimitStatus {
	pub const ALLOWED: RateLimitStatus = RateLimitStatus { limited: false, retry_after_ms: 0 };

	pub fn limited(retry_after_ms: i64) -> Self {
		Self { limited: true, retry_after_ms: retry_after_ms.max(0) }
	}

	/// Retry hint in whole seconds, rounded up (for `Retry-After` headers)
	pub fn retry_after_secs(&self) -> u64 {
		u64::try_from(self.retry_after_ms).unwrap_or_default().div_ceil(1000)
	}
}

/// What to answer when the ban table cannot be read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPolicy {
	/// Serve the request
	Open,
	/// Reject the request, asking the client to retry later
	Closed { retry_after_ms: i64 },
}

impl Default for FailPolicy {
	fn default() -> Self {
		FailPolicy::Closed { retry_after_ms: DEFAULT_FAIL_CLOSED_RETRY_MS }
	}
}

#[derive(Debug, Clone)]
pub struct BanLookup {
	adapter: Arc<dyn BanAdapter>,
	policy: FailPolicy,
	ignore_rate_limits: bool,
}

impl BanLookup {
	pub fn new(adapter: Arc<dyn BanAdapter>) -> Self {
		Self { adapter, policy: FailPolicy::default(), ignore_rate_limits: false }
	}

	/// Lookup with the default policy, honoring `IGNORE_RATE_LIMITS`
	pub fn from_env(adapter: Arc<dyn BanAdapter>) -> Self {
		let ignore = ignore_rate_limits_from_env();
		if ignore {
			info!("IGNORE_RATE_LIMITS is set, banned clients will be served");
		}
		Self::new(adapter).with_ignore_rate_limits(ignore)
	}

	pub fn with_policy(mut self, policy: FailPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Never reject requests in [`BanLookup::decide`] (bans are still computed)
	pub fn with_ignore_rate_limits(mut self, ignore: bool) -> Self {
		self.ignore_rate_limits = ignore;
		self
	}

	/// Looks up the current ban state of a caller.
	///
	/// Storage failures are returned as errors, never as "not limited".
	pub async fn check(&self, ip: Option<&str>, key: Option<&str>) -> ClResult<RateLimitStatus> {
		self.check_at(ip, key, Timestamp::now()).await
	}

	pub async fn check_at(
		&self,
		ip: Option<&str>,
		key: Option<&str>,
		now: Timestamp,
	) -> ClResult<RateLimitStatus> {
		let ip = non_empty(ip);
		let key = non_empty(key);
		if ip.is_none() && key.is_none() {
			return Ok(RateLimitStatus::ALLOWED);
		}

		let until = self.adapter.find_active_ban(ip.as_deref(), key.as_deref(), now).await?;
		Ok(match until {
			Some(until) if until > now => RateLimitStatus::limited(until.0 - now.0),
			_ => RateLimitStatus::ALLOWED,
		})
	}

	/// Allow/deny decision for the serving process, applying the fail policy
	pub async fn decide(&self, ip: Option<&str>, key: Option<&str>) -> RateLimitStatus {
		self.decide_at(ip, key, Timestamp::now()).await
	}

	pub async fn decide_at(
		&self,
		ip: Option<&str>,
		key: Option<&str>,
		now: Timestamp,
	) -> RateLimitStatus {
		match self.check_at(ip, key, now).await {
			Ok(status) if self.ignore_rate_limits => {
				if status.limited {
					debug!("ignoring active ban for ip={:?} key={:?}", ip, key);
				}
				RateLimitStatus::ALLOWED
			}
			Ok(status) => status,
			Err(err) => match self.policy {
				FailPolicy::Closed { retry_after_ms } if !self.ignore_rate_limits => {
					warn!("ban lookup failed, rejecting request: {}", err);
					RateLimitStatus::limited(retry_after_ms)
				}
				FailPolicy::Open | FailPolicy::Closed { .. } => {
					warn!("ban lookup failed, serving request: {}", err);
					RateLimitStatus::ALLOWED
				}
			},
		}
	}
}


// vim: ts=4
