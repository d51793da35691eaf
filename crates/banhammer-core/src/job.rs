//! Non-overlapping batch job runs

use std::future::Future;

use banhammer_types::job_lock_adapter::JobLockAdapter;

use crate::prelude::*;

pub const BAN_HAMMER_JOB: &str = "ban-hammer";
pub const PRUNE_LOGS_JOB: &str = "prune-logs";

/// Runs `f` while holding the advisory lock `name`.
///
/// Fails with `Error::Conflict` without running `f` if another run holds the
/// lock. The lock is released after `f` finishes, whatever its outcome; a
/// crashed holder's lock lapses after `ttl_ms`.
pub async fn run_exclusive<T, F, Fut>(
	locks: &dyn JobLockAdapter,
	name: &str,
	ttl_ms: i64,
	f: F,
) -> ClResult<T>
where
	F: FnOnce() -> Fut,
	Fut: Future<Output = ClResult<T>>,
{
	let holder = uuid::Uuid::new_v4().to_string();
	let now = Timestamp::now();
	if !locks.try_acquire_lock(name, &holder, now, now.add_ms(ttl_ms)).await? {
		return Err(Error::Conflict(format!("job '{}' is already running", name)));
	}
	debug!(job = name, holder = %holder, "acquired job lock");

	let res = f().await;

	if let Err(err) = locks.release_lock(name, &holder).await {
		warn!(job = name, "failed to release job lock, it expires in {}ms: {}", ttl_ms, err);
	}
	res
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory_adapter::MemoryAdapter;

	#[tokio::test]
	async fn test_runs_and_releases() {
		let adapter = MemoryAdapter::new();
		let res = run_exclusive(&adapter, "job", 60_000, || async { Ok(7) }).await;
		assert!(matches!(res, Ok(7)));

		// released: a second run gets the lock again
		let res = run_exclusive(&adapter, "job", 60_000, || async { Ok(8) }).await;
		assert!(matches!(res, Ok(8)));
	}

	#[tokio::test]
	async fn test_releases_after_failure() {
		let adapter = MemoryAdapter::new();
		let res: ClResult<()> =
			run_exclusive(&adapter, "job", 60_000, || async { Err(Error::DbError) }).await;
		assert!(matches!(res, Err(Error::DbError)));

		let res = run_exclusive(&adapter, "job", 60_000, || async { Ok(()) }).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn test_overlapping_run_is_rejected() {
		let adapter = MemoryAdapter::new();
		let res = run_exclusive(&adapter, "job", 60_000, || async {
			let inner = run_exclusive(&adapter, "job", 60_000, || async { Ok(()) }).await;
			assert!(matches!(inner, Err(Error::Conflict(_))));
			Ok(())
		})
		.await;
		assert!(res.is_ok());

		// other job names are independent
		let res = run_exclusive(&adapter, "job", 60_000, || async {
			run_exclusive(&adapter, "other", 60_000, || async { Ok(()) }).await
		})
		.await;
		assert!(res.is_ok());
	}
}

// vim: ts=4
