//! Log Retention Pruner

use banhammer_types::event_log_adapter::EventLogAdapter;

use crate::config::PruneConfig;
use crate::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
	pub deleted: u64,
}

/// Trims the request log to the `max_log_entries` most recently inserted events
pub async fn prune_logs(config: &PruneConfig, log: &dyn EventLogAdapter) -> ClResult<PruneReport> {
	debug!("pruning request log to {} entries", config.max_log_entries);
	let deleted = log.prune_events(config.max_log_entries).await?;
	if deleted > 0 {
		info!(deleted, max_log_entries = config.max_log_entries, "pruned request log");
	} else {
		debug!("found no entries to prune");
	}
	Ok(PruneReport { deleted })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory_adapter::MemoryAdapter;
	use banhammer_types::types::RequestEvent;

	async fn fill(adapter: &MemoryAdapter, n: i64) {
		for i in 0..n {
			let event = RequestEvent::new(Some("1.2.3.4"), None, None, None, 200, Timestamp(i));
			assert!(adapter.append_event(&event).await.is_ok());
		}
	}

	#[tokio::test]
	async fn test_prune_bounds_size_for_any_prior_size() {
		for size in [0, 1, 9, 10, 11, 57] {
			let adapter = MemoryAdapter::new();
			fill(&adapter, size).await;
			let config = PruneConfig { max_log_entries: 10 };

			let report = prune_logs(&config, &adapter).await;
			let expected = u64::try_from(size).unwrap_or_default().saturating_sub(10);
			assert!(matches!(report, Ok(PruneReport { deleted }) if deleted == expected));
			assert!(matches!(adapter.count_events().await, Ok(n) if n <= 10));
		}
	}

	#[tokio::test]
	async fn test_second_prune_is_noop() {
		let adapter = MemoryAdapter::new();
		fill(&adapter, 25).await;
		let config = PruneConfig { max_log_entries: 5 };

		assert!(matches!(prune_logs(&config, &adapter).await, Ok(PruneReport { deleted: 20 })));
		assert!(matches!(prune_logs(&config, &adapter).await, Ok(PruneReport { deleted: 0 })));
		assert!(matches!(adapter.count_events().await, Ok(5)));
	}

	#[tokio::test]
	async fn test_prune_failure_is_reported() {
		let adapter = MemoryAdapter::new();
		fill(&adapter, 3).await;
		adapter.set_unavailable(true);
		let res = prune_logs(&PruneConfig { max_log_entries: 1 }, &adapter).await;
		assert!(matches!(res, Err(Error::DbError)));
		adapter.set_unavailable(false);
		assert!(matches!(adapter.count_events().await, Ok(3)));
	}
}

// vim: ts=4
