//! Ban aggregation job

use banhammer_adapter_sqlite::SqliteAdapter;
use banhammer_core::job::{BAN_HAMMER_JOB, run_exclusive};
use banhammer_core::{BanHammerConfig, CycleReport, run_cycle};
use banhammer_types::prelude::*;

use crate::JobEnv;

/// Loads the configuration from the environment and runs one cycle now
pub async fn run_from_env() -> ClResult<CycleReport> {
	// validate before touching storage
	let config = BanHammerConfig::from_env()?;
	let env = JobEnv::from_env()?;
	run(&env, &config, Timestamp::now()).await
}

/// Runs one aggregation cycle against the database in `env.db_dir`
pub async fn run(env: &JobEnv, config: &BanHammerConfig, now: Timestamp) -> ClResult<CycleReport> {
	let storage = SqliteAdapter::new(&env.db_dir).await?;
	let res = run_exclusive(&storage, BAN_HAMMER_JOB, env.lock_ttl_ms, || {
		run_cycle(config, &storage, &storage, now)
	})
	.await;
	storage.close().await;
	res
}

// vim: ts=4
