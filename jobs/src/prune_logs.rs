//! Request log retention job

use banhammer_adapter_sqlite::SqliteAdapter;
use banhammer_core::job::{PRUNE_LOGS_JOB, run_exclusive};
use banhammer_core::{PruneConfig, PruneReport};
use banhammer_types::prelude::*;

use crate::JobEnv;

pub async fn run_from_env() -> ClResult<PruneReport> {
	let config = PruneConfig::from_env()?;
	let env = JobEnv::from_env()?;
	run(&env, &config).await
}

pub async fn run(env: &JobEnv, config: &PruneConfig) -> ClResult<PruneReport> {
	let storage = SqliteAdapter::new(&env.db_dir).await?;
	let res = run_exclusive(&storage, PRUNE_LOGS_JOB, env.lock_ttl_ms, || {
		banhammer_core::prune_logs(config, &storage)
	})
	.await;
	storage.close().await;
	res
}

// vim: ts=4
