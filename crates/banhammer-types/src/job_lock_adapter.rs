//! Advisory locks keeping batch jobs from overlapping with themselves.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[async_trait]
pub trait JobLockAdapter: Debug + Send + Sync {
	/// Takes the lock `name` for `holder` until `expires_at`.
	///
	/// Returns `false` if another holder owns an unexpired lock. An expired lock
	/// is taken over.
	async fn try_acquire_lock(
		&self,
		name: &str,
		holder: &str,
		now: Timestamp,
		expires_at: Timestamp,
	) -> ClResult<bool>;

	/// Releases the lock if `holder` still owns it
	async fn release_lock(&self, name: &str, holder: &str) -> ClResult<()>;
}

// vim: ts=4
