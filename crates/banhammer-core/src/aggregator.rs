//! Ban Aggregator
//!
//! Recomputes the ban table from scratch on every cycle:
//!
//! 1. key-based violators: buckets of `(key, window)` above the threshold
//! 2. ip-based violators: buckets of `(ip, window)` above the threshold
//! 3. carried bans: current bans that expired less than `default_ban * multiplier` ago
//! 4. merge per identity, escalating identities flagged by more than one source
//! 5. atomically replace the ban table with the merged set

use std::collections::{HashMap, HashSet};

use banhammer_types::{
	ban_adapter::BanAdapter,
	event_log_adapter::EventLogAdapter,
	types::{BanEntry, BucketCount},
};

use crate::config::BanHammerConfig;
use crate::prelude::*;

/// Summary of one aggregation cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
	/// Distinct keys that exceeded the threshold in this cycle
	pub key_violators: usize,
	/// Distinct IPs that exceeded the threshold in this cycle
	pub ip_violators: usize,
	/// Bans carried over from the previous table
	pub carried: usize,
	/// Identities whose ban was escalated
	pub escalated: usize,
	/// Entries written to the new ban table
	pub total: usize,
}

/// Bans every identity with a bucket above `threshold` until `until`.
///
/// An identity violating in several buckets yields a single candidate.
/// `threshold` may be fractional.
#[allow(clippy::cast_precision_loss)]
pub fn detect_violations(
	scope: BanScope,
	counts: &[BucketCount],
	threshold: f64,
	until: Timestamp,
) -> Vec<BanEntry> {
	let mut seen = HashSet::new();
	counts
		.iter()
		.filter(|bucket| bucket.count as f64 > threshold)
		.filter(|bucket| seen.insert(bucket.identity.clone()))
		.map(|bucket| BanEntry::new(Identity::new(scope, bucket.identity.clone()), until))
		.collect()
}

/// Result of merging candidate sources
#[derive(Debug, Default)]
pub struct MergeResult {
	pub bans: Vec<BanEntry>,
	pub escalated: usize,
}

/// Merges candidate bans from several sources into one entry per identity.
///
/// Each source counts at most once per identity. An identity contributed by
/// exactly one source keeps the latest `until` of its candidates; one
/// contributed by more sources is escalated to at least `escalated_until`.
/// The output is sorted by scope, then identity value.
pub fn merge_candidates(sources: &[&[BanEntry]], escalated_until: Timestamp) -> MergeResult {
	let mut merged: HashMap<&Identity, (u32, Timestamp)> = HashMap::new();

	for source in sources {
		let mut counted: HashSet<&Identity> = HashSet::new();
		for candidate in *source {
			let entry = merged.entry(&candidate.identity).or_insert((0, candidate.until));
			if counted.insert(&candidate.identity) {
				entry.0 += 1;
			}
			entry.1 = entry.1.max(candidate.until);
		}
	}

	let mut escalated = 0;
	let mut bans: Vec<BanEntry> = merged
		.into_iter()
		.map(|(identity, (count, until))| {
			let until = if count == 1 {
				until
			} else {
				escalated += 1;
				until.max(escalated_until)
			};
			BanEntry::new(identity.clone(), until)
		})
		.collect();
	bans.sort_by(|a, b| {
		a.identity
			.scope()
			.code()
			.cmp(b.identity.scope().code())
			.then_with(|| a.identity.value().cmp(b.identity.value()))
	});

	MergeResult { bans, escalated }
}

/// Runs one aggregation cycle starting at `now`.
///
/// Nothing is written unless every read succeeds; the final replace is a
/// single atomic operation of the ban adapter.
pub async fn run_cycle(
	config: &BanHammerConfig,
	log: &dyn EventLogAdapter,
	bans: &dyn BanAdapter,
	now: Timestamp,
) -> ClResult<CycleReport> {
	let since = now.sub_ms(config.aggregation_interval_ms);
	let ban_until = now.add_ms(config.default_ban_ms);
	let recidivism_ms = config.recidivism_ban_ms();
	debug!(
		"cycle at {}: since={} window={}ms threshold={} ban={}ms recidivism={}ms",
		now,
		since,
		config.resolution_window_ms,
		config.max_requests_per_window,
		config.default_ban_ms,
		recidivism_ms
	);

	let key_counts = log.count_by_bucket(BanScope::Key, since, config.resolution_window_ms).await?;
	let key_based =
		detect_violations(BanScope::Key, &key_counts, config.max_requests_per_window, ban_until);

	let ip_counts = log.count_by_bucket(BanScope::Ip, since, config.resolution_window_ms).await?;
	let ip_based =
		detect_violations(BanScope::Ip, &ip_counts, config.max_requests_per_window, ban_until);

	let previous = bans.list_bans(now.sub_ms(recidivism_ms)).await?;

	let merged = merge_candidates(
		&[key_based.as_slice(), ip_based.as_slice(), previous.as_slice()],
		now.add_ms(recidivism_ms),
	);
	bans.replace_bans(&merged.bans).await?;

	for ban in merged.bans.iter().filter(|ban| ban.is_active(now)) {
		debug!("banned {} until {}", ban.identity, ban.until);
	}

	let report = CycleReport {
		key_violators: key_based.len(),
		ip_violators: ip_based.len(),
		carried: previous.len(),
		escalated: merged.escalated,
		total: merged.bans.len(),
	};
	info!(
		key_violators = report.key_violators,
		ip_violators = report.ip_violators,
		carried = report.carried,
		escalated = report.escalated,
		total = report.total,
		"ban table replaced"
	);
	Ok(report)
}


// vim: ts=4
