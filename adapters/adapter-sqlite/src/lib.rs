//! SQLite storage adapter for banhammer.
//!
//! Keeps the request log, the ban table and the job locks in a single
//! `system.db` database file. The database runs in WAL mode, so the request
//! path can read the ban table while a job replaces it.

#![forbid(unsafe_code)]

mod ban;
mod event_log;
mod job_lock;
mod schema;
mod utils;

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::path::Path;

use banhammer_types::{
	ban_adapter::BanAdapter,
	event_log_adapter::EventLogAdapter,
	job_lock_adapter::JobLockAdapter,
	prelude::*,
	types::{BanEntry, BucketCount, RequestEvent},
};

/// Database file name inside the data directory
pub const DB_FILE_NAME: &str = "system.db";

#[derive(Debug, Clone)]
pub struct SqliteAdapter {
	db: SqlitePool,
}

impl SqliteAdapter {
	/// Opens (and if needed creates) `system.db` in `dir`
	pub async fn new(dir: impl AsRef<Path>) -> ClResult<Self> {
		let dir = dir.as_ref();
		tokio::fs::create_dir_all(dir).await.map_err(|err| {
			error!("Cannot create data directory {}: {}", dir.display(), err);
			Error::ConfigError(format!("cannot create data directory {}", dir.display()))
		})?;
		Self::open(dir.join(DB_FILE_NAME)).await
	}

	/// Opens the database at an explicit file path
	pub async fn open(path: impl AsRef<Path>) -> ClResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(utils::inspect)
			.map_err(|_| Error::DbError)?;

		schema::init_db(&db).await.inspect_err(utils::inspect).map_err(|_| Error::DbError)?;
		debug!("opened database {}", path.as_ref().display());

		Ok(Self { db })
	}

	/// Waits for open connections to finish and closes the pool
	pub async fn close(&self) {
		self.db.close().await;
	}
}

#[async_trait]
impl EventLogAdapter for SqliteAdapter {
	async fn append_event(&self, event: &RequestEvent) -> ClResult<()> {
		event_log::append(&self.db, event).await
	}

	async fn count_by_bucket(
		&self,
		scope: BanScope,
		since: Timestamp,
		resolution_ms: i64,
	) -> ClResult<Vec<BucketCount>> {
		event_log::count_by_bucket(&self.db, scope, since, resolution_ms).await
	}

	async fn count_events(&self) -> ClResult<u64> {
		event_log::count(&self.db).await
	}

	async fn prune_events(&self, max_entries: u64) -> ClResult<u64> {
		event_log::prune(&self.db, max_entries).await
	}
}

#[async_trait]
impl BanAdapter for SqliteAdapter {
	async fn list_bans(&self, since: Timestamp) -> ClResult<Vec<BanEntry>> {
		ban::list(&self.db, since).await
	}

	async fn replace_bans(&self, bans: &[BanEntry]) -> ClResult<()> {
		ban::replace(&self.db, bans).await
	}

	async fn find_active_ban(
		&self,
		ip: Option<&str>,
		key: Option<&str>,
		now: Timestamp,
	) -> ClResult<Option<Timestamp>> {
		ban::find_active(&self.db, ip, key, now).await
	}
}

#[async_trait]
impl JobLockAdapter for SqliteAdapter {
	async fn try_acquire_lock(
		&self,
		name: &str,
		holder: &str,
		now: Timestamp,
		expires_at: Timestamp,
	) -> ClResult<bool> {
		job_lock::try_acquire(&self.db, name, holder, now, expires_at).await
	}

	async fn release_lock(&self, name: &str, holder: &str) -> ClResult<()> {
		job_lock::release(&self.db, name, holder).await
	}
}

// vim: ts=4
