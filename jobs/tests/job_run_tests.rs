//! End-to-end runs of the batch jobs against a temporary database

#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use banhammer_adapter_sqlite::SqliteAdapter;
use banhammer_core::job::BAN_HAMMER_JOB;
use banhammer_core::{BanHammerConfig, BanLookup, PruneConfig, RateLimitStatus, RequestLogger};
use banhammer_jobs::{JobEnv, ban_hammer, prune_logs};
use banhammer_types::ban_adapter::BanAdapter;
use banhammer_types::event_log_adapter::EventLogAdapter;
use banhammer_types::job_lock_adapter::JobLockAdapter;
use banhammer_types::prelude::*;
use banhammer_types::types::{BanEntry, RequestEvent};
use tempfile::TempDir;

// aligned to a 60s bucket
const NOW: Timestamp = Timestamp(1_700_000_040_000);

fn job_env(tmp: &TempDir) -> JobEnv {
	JobEnv { db_dir: tmp.path().to_path_buf(), lock_ttl_ms: 60_000 }
}

fn config() -> BanHammerConfig {
	BanHammerConfig {
		aggregation_interval_ms: 60_000,
		resolution_window_ms: 60_000,
		max_requests_per_window: 5.0,
		default_ban_ms: 600_000,
		recidivism_multiplier: 4.0,
	}
}

/// Records `n` requests from `ip` through the ingestion hook
async fn ingest(tmp: &TempDir, ip: &str, n: i64, start: Timestamp) {
	let storage = Arc::new(SqliteAdapter::new(tmp.path()).await.unwrap());
	let logger = RequestLogger::spawn(storage.clone());
	for i in 0..n {
		logger.log_event(RequestEvent::new(
			Some(ip),
			None,
			Some("GET"),
			Some("v1/dummy"),
			200,
			start.add_ms(i * 100),
		));
	}
	let stats = logger.shutdown().await;
	assert_eq!(stats.failed + stats.dropped, 0);
	storage.close().await;
}

#[tokio::test]
async fn test_noisy_ip_gets_banned_and_limited() {
	let tmp = TempDir::new().unwrap();
	ingest(&tmp, "1.2.3.4", 6, NOW.sub_ms(30_000)).await;
	ingest(&tmp, "5.6.7.8", 5, NOW.sub_ms(30_000)).await;

	let report = ban_hammer::run(&job_env(&tmp), &config(), NOW).await.unwrap();
	assert_eq!(report.ip_violators, 1);
	assert_eq!(report.total, 1);

	let storage = Arc::new(SqliteAdapter::new(tmp.path()).await.unwrap());
	let bans = storage.list_bans(Timestamp(0)).await.unwrap();
	assert_eq!(bans, vec![BanEntry::new(Identity::Ip("1.2.3.4".into()), NOW.add_ms(600_000))]);

	let lookup = BanLookup::new(storage.clone());
	let status = lookup.check_at(Some("1.2.3.4"), None, NOW).await.unwrap();
	assert_eq!(status, RateLimitStatus::limited(600_000));
	let status = lookup.check_at(Some("5.6.7.8"), None, NOW).await.unwrap();
	assert_eq!(status, RateLimitStatus::ALLOWED);
}

#[tokio::test]
async fn test_repeat_offender_is_escalated() {
	let tmp = TempDir::new().unwrap();
	let env = job_env(&tmp);

	ingest(&tmp, "1.2.3.4", 6, NOW.sub_ms(30_000)).await;
	ban_hammer::run(&env, &config(), NOW).await.unwrap();

	let next = NOW.add_ms(60_000);
	ingest(&tmp, "1.2.3.4", 6, next.sub_ms(30_000)).await;
	let report = ban_hammer::run(&env, &config(), next).await.unwrap();
	assert_eq!(report.escalated, 1);

	let storage = SqliteAdapter::new(tmp.path()).await.unwrap();
	let bans = storage.list_bans(Timestamp(0)).await.unwrap();
	assert_eq!(bans, vec![BanEntry::new(Identity::Ip("1.2.3.4".into()), next.add_ms(2_400_000))]);
}

#[tokio::test]
async fn test_quiet_cycle_carries_ban_forward() {
	let tmp = TempDir::new().unwrap();
	let env = job_env(&tmp);

	ingest(&tmp, "1.2.3.4", 6, NOW.sub_ms(30_000)).await;
	ban_hammer::run(&env, &config(), NOW).await.unwrap();

	let next = NOW.add_ms(60_000);
	let report = ban_hammer::run(&env, &config(), next).await.unwrap();
	assert_eq!(report.carried, 1);
	assert_eq!(report.escalated, 0);

	let storage = Arc::new(SqliteAdapter::new(tmp.path()).await.unwrap());
	let status = BanLookup::new(storage).check_at(Some("1.2.3.4"), None, next).await.unwrap();
	assert_eq!(status, RateLimitStatus::limited(540_000));
}

#[tokio::test]
async fn test_held_lock_aborts_without_writing() {
	let tmp = TempDir::new().unwrap();
	let storage = SqliteAdapter::new(tmp.path()).await.unwrap();
	let previous = vec![BanEntry::new(Identity::Key("k".into()), NOW.add_ms(1_000))];
	storage.replace_bans(&previous).await.unwrap();

	let now = Timestamp::now();
	assert!(storage.try_acquire_lock(BAN_HAMMER_JOB, "other-run", now, now.add_ms(60_000)).await.unwrap());

	ingest(&tmp, "1.2.3.4", 6, NOW.sub_ms(30_000)).await;
	let res = ban_hammer::run(&job_env(&tmp), &config(), NOW).await;
	assert!(matches!(res, Err(Error::Conflict(_))));
	assert_eq!(storage.list_bans(Timestamp(0)).await.unwrap(), previous);

	// the other run finishes, ours can go
	storage.release_lock(BAN_HAMMER_JOB, "other-run").await.unwrap();
	assert!(ban_hammer::run(&job_env(&tmp), &config(), NOW).await.is_ok());
}

#[tokio::test]
async fn test_prune_job_bounds_log() {
	let tmp = TempDir::new().unwrap();
	let env = job_env(&tmp);
	ingest(&tmp, "1.2.3.4", 30, NOW).await;

	let config = PruneConfig { max_log_entries: 10 };
	let report = prune_logs::run(&env, &config).await.unwrap();
	assert_eq!(report.deleted, 20);
	let report = prune_logs::run(&env, &config).await.unwrap();
	assert_eq!(report.deleted, 0);

	let storage = SqliteAdapter::new(tmp.path()).await.unwrap();
	assert_eq!(storage.count_events().await.unwrap(), 10);
}

// vim: ts=4
