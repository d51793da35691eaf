//! In-memory storage adapter
//!
//! Implements the event log, the ban table and job locks on plain
//! collections. Useful for tests and for single-process deployments where
//! the serving process also runs the jobs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use banhammer_types::{
	ban_adapter::BanAdapter,
	bucket::BucketCounter,
	event_log_adapter::EventLogAdapter,
	job_lock_adapter::JobLockAdapter,
	types::{BanEntry, BucketCount, RequestEvent},
};

use crate::prelude::*;

#[derive(Debug, Default)]
struct EventLog {
	next_id: u64,
	events: Vec<(u64, RequestEvent)>,
}

#[derive(Debug, Default)]
pub struct MemoryAdapter {
	log: RwLock<EventLog>,
	bans: RwLock<Arc<Vec<BanEntry>>>,
	locks: RwLock<HashMap<String, (String, Timestamp)>>,
	unavailable: AtomicBool,
}

impl MemoryAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every operation fail with `Error::DbError` while set
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::Relaxed);
	}

	fn check_available(&self) -> ClResult<()> {
		if self.unavailable.load(Ordering::Relaxed) {
			warn!("DB: memory adapter marked unavailable");
			return Err(Error::DbError);
		}
		Ok(())
	}
}

#[async_trait]
impl EventLogAdapter for MemoryAdapter {
	async fn append_event(&self, event: &RequestEvent) -> ClResult<()> {
		self.check_available()?;
		let mut log = self.log.write();
		log.next_id += 1;
		let id = log.next_id;
		log.events.push((id, event.clone()));
		Ok(())
	}

	async fn count_by_bucket(
		&self,
		scope: BanScope,
		since: Timestamp,
		resolution_ms: i64,
	) -> ClResult<Vec<BucketCount>> {
		self.check_available()?;
		let mut counter = BucketCounter::new(resolution_ms);
		for (_, event) in self.log.read().events.iter().filter(|(_, e)| e.timestamp >= since) {
			if let Some(identity) = event.identity(scope) {
				counter.add(identity, event.timestamp);
			}
		}
		Ok(counter.into_counts())
	}

	async fn count_events(&self) -> ClResult<u64> {
		self.check_available()?;
		Ok(self.log.read().events.len() as u64)
	}

	async fn prune_events(&self, max_entries: u64) -> ClResult<u64> {
		self.check_available()?;
		let mut log = self.log.write();
		let keep = usize::try_from(max_entries).unwrap_or(usize::MAX);
		if log.events.len() <= keep {
			return Ok(0);
		}
		// ids are handed out in insertion order, so the oldest events come first
		let remove = log.events.len() - keep;
		log.events.drain(..remove);
		Ok(remove as u64)
	}
}

#[async_trait]
impl BanAdapter for MemoryAdapter {
	async fn list_bans(&self, since: Timestamp) -> ClResult<Vec<BanEntry>> {
		self.check_available()?;
		let bans = Arc::clone(&self.bans.read());
		Ok(bans.iter().filter(|ban| ban.until >= since).cloned().collect())
	}

	async fn replace_bans(&self, bans: &[BanEntry]) -> ClResult<()> {
		self.check_available()?;
		let table = Arc::new(bans.to_vec());
		*self.bans.write() = table;
		Ok(())
	}

	async fn find_active_ban(
		&self,
		ip: Option<&str>,
		key: Option<&str>,
		now: Timestamp,
	) -> ClResult<Option<Timestamp>> {
		self.check_available()?;
		let bans = Arc::clone(&self.bans.read());
		Ok(bans
			.iter()
			.filter(|ban| ban.is_active(now))
			.filter(|ban| match ban.identity.scope() {
				BanScope::Ip => ip == Some(ban.identity.value()),
				BanScope::Key => key == Some(ban.identity.value()),
			})
			.map(|ban| ban.until)
			.max())
	}
}

#[async_trait]
impl JobLockAdapter for MemoryAdapter {
	async fn try_acquire_lock(
		&self,
		name: &str,
		holder: &str,
		now: Timestamp,
		expires_at: Timestamp,
	) -> ClResult<bool> {
		self.check_available()?;
		let mut locks = self.locks.write();
		match locks.get(name) {
			Some((owner, expiry)) if owner != holder && *expiry >= now => Ok(false),
			_ => {
				locks.insert(name.to_string(), (holder.to_string(), expires_at));
				Ok(true)
			}
		}
	}

	async fn release_lock(&self, name: &str, holder: &str) -> ClResult<()> {
		self.check_available()?;
		let mut locks = self.locks.write();
		if locks.get(name).is_some_and(|(owner, _)| owner == holder) {
			locks.remove(name);
		}
		Ok(())
	}
}


// vim: ts=4
