//! Adapter that stores the materialized ban table.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{prelude::*, types::BanEntry};

#[async_trait]
pub trait BanAdapter: Debug + Send + Sync {
	/// Lists every ban whose `until >= since`
	async fn list_bans(&self, since: Timestamp) -> ClResult<Vec<BanEntry>>;

	/// Replaces the whole ban table content.
	///
	/// Concurrent readers must observe either the complete previous content or
	/// the complete new content, never a mixture.
	async fn replace_bans(&self, bans: &[BanEntry]) -> ClResult<()>;

	/// Latest `until` among bans matching `ip` or `key` that are still active
	/// at `now` (`until > now`)
	async fn find_active_ban(
		&self,
		ip: Option<&str>,
		key: Option<&str>,
		now: Timestamp,
	) -> ClResult<Option<Timestamp>>;
}

// vim: ts=4
