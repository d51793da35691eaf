//! Common types used throughout banhammer.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// Timestamp //
//***********//
/// Epoch milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(i64::try_from(res.as_millis()).unwrap_or(i64::MAX))
	}

	pub fn add_ms(self, ms: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(ms))
	}

	pub fn sub_ms(self, ms: i64) -> Timestamp {
		Timestamp(self.0.saturating_sub(ms))
	}

	/// Index of the resolution bucket this timestamp falls into
	pub fn bucket(self, resolution_ms: i64) -> i64 {
		self.0.div_euclid(resolution_ms.max(1))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

// Identity //
//**********//
/// Which identity space a ban applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanScope {
	Ip,
	Key,
}

impl BanScope {
	/// Single-character code used by storage backends
	pub fn code(self) -> &'static str {
		match self {
			BanScope::Ip => "I",
			BanScope::Key => "K",
		}
	}

	pub fn from_code(code: &str) -> Option<BanScope> {
		match code {
			"I" => Some(BanScope::Ip),
			"K" => Some(BanScope::Key),
			_ => None,
		}
	}
}

/// A banned (or bannable) client identity.
///
/// IP addresses and auth keys are disjoint identity spaces: `Ip("x")` and
/// `Key("x")` never refer to the same client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "value", rename_all = "lowercase")]
pub enum Identity {
	Ip(Box<str>),
	Key(Box<str>),
}

impl Identity {
	pub fn new(scope: BanScope, value: impl Into<Box<str>>) -> Identity {
		match scope {
			BanScope::Ip => Identity::Ip(value.into()),
			BanScope::Key => Identity::Key(value.into()),
		}
	}

	pub fn scope(&self) -> BanScope {
		match self {
			Identity::Ip(_) => BanScope::Ip,
			Identity::Key(_) => BanScope::Key,
		}
	}

	pub fn value(&self) -> &str {
		match self {
			Identity::Ip(v) | Identity::Key(v) => v,
		}
	}
}

impl std::fmt::Display for Identity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Identity::Ip(ip) => write!(f, "ip:{}", ip),
			Identity::Key(key) => write!(f, "key:{}", key),
		}
	}
}

// RequestEvent //
//**************//
/// One record of the request log, written after a request was dispatched
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
	pub ip: Option<Box<str>>,
	pub key: Option<Box<str>>,
	pub method: Option<Box<str>>,
	pub route: Option<Box<str>>,
	pub status_code: u16,
	pub timestamp: Timestamp,
}

impl RequestEvent {
	/// Build an event, turning empty strings into missing values
	pub fn new(
		ip: Option<&str>,
		key: Option<&str>,
		method: Option<&str>,
		route: Option<&str>,
		status_code: u16,
		timestamp: Timestamp,
	) -> RequestEvent {
		RequestEvent {
			ip: non_empty(ip),
			key: non_empty(key),
			method: non_empty(method),
			route: non_empty(route),
			status_code,
			timestamp,
		}
	}

	/// The identity this event counts towards in the given scope, if any
	pub fn identity(&self, scope: BanScope) -> Option<&str> {
		match scope {
			BanScope::Ip => self.ip.as_deref(),
			BanScope::Key => self.key.as_deref(),
		}
	}
}

pub fn non_empty(value: Option<&str>) -> Option<Box<str>> {
	value.map(str::trim).filter(|v| !v.is_empty()).map(Box::from)
}

// BanEntry //
//**********//
/// One row of the ban table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
	pub identity: Identity,
	pub until: Timestamp,
}

impl BanEntry {
	pub fn new(identity: Identity, until: Timestamp) -> BanEntry {
		BanEntry { identity, until }
	}

	pub fn is_active(&self, now: Timestamp) -> bool {
		self.until > now
	}
}

// BucketCount //
//*************//
/// Number of events one identity sent within one resolution bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketCount {
	pub identity: Box<str>,
	pub bucket: i64,
	pub count: u64,
}


// vim: ts=4
