//! Recomputes the ban table from recent traffic. Run it every
//! `BAN_HAMMER_WILL_BE_CALLED_EVERY_SECONDS` seconds.

use std::process::ExitCode;

use banhammer_core::job::BAN_HAMMER_JOB;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	banhammer_jobs::init_tracing();
	let res = banhammer_jobs::ban_hammer::run_from_env().await;
	banhammer_jobs::finish(BAN_HAMMER_JOB, res)
}

// vim: ts=4
