//! Trims the request log to the newest `PRUNE_LOGS_MAX_LOGS` entries.

use std::process::ExitCode;

use banhammer_core::job::PRUNE_LOGS_JOB;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	banhammer_jobs::init_tracing();
	let res = banhammer_jobs::prune_logs::run_from_env().await;
	banhammer_jobs::finish(PRUNE_LOGS_JOB, res)
}

// vim: ts=4
