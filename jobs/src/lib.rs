//! Batch job harness.
//!
//! Both binaries follow the same run: initialize logging, load and validate
//! the job's own configuration, open a storage handle scoped to the run, do
//! the work under the job's advisory lock, close the handle, and turn the
//! outcome into an exit code.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod ban_hammer;
pub mod prune_logs;

use std::path::PathBuf;
use std::process::ExitCode;

use banhammer_types::prelude::*;

pub const ENV_DB_DIR: &str = "DB_DIR";
pub const ENV_JOB_LOCK_TTL: &str = "JOB_LOCK_TTL_SECONDS";

pub const DEFAULT_DB_DIR: &str = "./data";
pub const DEFAULT_JOB_LOCK_TTL_SECS: i64 = 600;

/// Exit code of a failed run
pub const EXIT_FAILURE: u8 = 2;

/// Settings shared by every job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobEnv {
	/// Directory holding `system.db`
	pub db_dir: PathBuf,
	pub lock_ttl_ms: i64,
}

impl JobEnv {
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(get: F) -> ClResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let db_dir = get(ENV_DB_DIR)
			.filter(|dir| !dir.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_DB_DIR.to_string());

		let lock_ttl_secs = match get(ENV_JOB_LOCK_TTL) {
			None => DEFAULT_JOB_LOCK_TTL_SECS,
			Some(raw) => match raw.trim().parse::<i64>() {
				Ok(secs) if secs > 0 => secs,
				_ => {
					return Err(Error::ConfigError(format!(
						"{} must be a positive integer, got \"{}\"",
						ENV_JOB_LOCK_TTL, raw
					)));
				}
			},
		};

		Ok(Self { db_dir: PathBuf::from(db_dir), lock_ttl_ms: lock_ttl_secs.saturating_mul(1000) })
	}
}

/// Logs to stderr, filtered by `RUST_LOG` (errors only when unset)
pub fn init_tracing() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.try_init();
}

/// Reports the outcome of a run and maps it to the process exit code
pub fn finish<T: std::fmt::Debug>(job: &str, res: ClResult<T>) -> ExitCode {
	match res {
		Ok(report) => {
			info!(job, "finished: {:?}", report);
			ExitCode::SUCCESS
		}
		Err(err) => {
			error!(job, "failed: {}", err);
			eprintln!("{}: {}", job, err);
			ExitCode::from(EXIT_FAILURE)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_job_env_defaults() {
		let env = JobEnv::from_lookup(|_| None);
		assert!(matches!(env, Ok(ref e) if e.db_dir == PathBuf::from("./data")));
		assert!(matches!(env, Ok(ref e) if e.lock_ttl_ms == 600_000));
	}

	#[test]
	fn test_job_env_overrides() {
		let env = JobEnv::from_lookup(|name| match name {
			ENV_DB_DIR => Some("/var/lib/banhammer".into()),
			ENV_JOB_LOCK_TTL => Some("30".into()),
			_ => None,
		});
		assert_eq!(
			env.ok(),
			Some(JobEnv { db_dir: PathBuf::from("/var/lib/banhammer"), lock_ttl_ms: 30_000 })
		);
	}

	#[test]
	fn test_invalid_lock_ttl_is_rejected() {
		for bad in ["0", "-1", "ten"] {
			let res = JobEnv::from_lookup(|name| (name == ENV_JOB_LOCK_TTL).then(|| bad.to_string()));
			assert!(matches!(res, Err(Error::ConfigError(_))), "accepted {:?}", bad);
		}
	}

	#[test]
	fn test_finish_exit_codes() {
		assert_eq!(finish("job", Ok(())), ExitCode::SUCCESS);
		assert_eq!(finish::<()>("job", Err(Error::DbError)), ExitCode::from(2));
	}
}

// vim: ts=4
