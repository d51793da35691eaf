//! Adapter that stores the append-only request log.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
	prelude::*,
	types::{BucketCount, RequestEvent},
};

#[async_trait]
pub trait EventLogAdapter: Debug + Send + Sync {
	/// Durably appends one event
	async fn append_event(&self, event: &RequestEvent) -> ClResult<()>;

	/// Counts events with `timestamp >= since` that carry an identity in `scope`,
	/// grouped by `(identity, floor(timestamp / resolution_ms))`.
	///
	/// Events without a value for the scope's identity are skipped, so an event
	/// without a key never counts towards key-based grouping.
	async fn count_by_bucket(
		&self,
		scope: BanScope,
		since: Timestamp,
		resolution_ms: i64,
	) -> ClResult<Vec<BucketCount>>;

	/// Number of events currently stored
	async fn count_events(&self) -> ClResult<u64>;

	/// Deletes all but the `max_entries` most recently inserted events.
	///
	/// Insertion order decides recency, not the event timestamps. Returns the
	/// number of deleted events.
	async fn prune_events(&self, max_entries: u64) -> ClResult<u64>;
}

// vim: ts=4
