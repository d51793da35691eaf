//! Job configuration
//!
//! Both batch jobs read their settings from the environment once at start and
//! treat them as immutable for the run. Every setting is required and must be
//! a positive number; anything else aborts the job before storage is touched.

use crate::prelude::*;

pub const ENV_AGGREGATION_INTERVAL: &str = "BAN_HAMMER_WILL_BE_CALLED_EVERY_SECONDS";
pub const ENV_MAX_REQUESTS_PER_WINDOW: &str = "BAN_HAMMER_MAX_REQUESTS_PER_WINDOW";
pub const ENV_RESOLUTION_WINDOW: &str = "BAN_HAMMER_RESOLUTION_WINDOW_SECONDS";
pub const ENV_DEFAULT_BAN_MINUTES: &str = "BAN_HAMMER_DEFAULT_BAN_TIME_MINUTES";
pub const ENV_RECIDIVISM_MULTIPLIER: &str = "BAN_HAMMER_RECIDIVISM_PUNISH_MULTIPLIER";
pub const ENV_MAX_LOGS: &str = "PRUNE_LOGS_MAX_LOGS";
pub const ENV_IGNORE_RATE_LIMITS: &str = "IGNORE_RATE_LIMITS";

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// Settings of the ban aggregator
#[derive(Clone, Debug, PartialEq)]
pub struct BanHammerConfig {
	/// How far back each cycle looks (the scheduling cadence of the job)
	pub aggregation_interval_ms: i64,
	/// Bucket width used for counting
	pub resolution_window_ms: i64,
	/// A bucket with more requests than this is a violation
	pub max_requests_per_window: f64,
	/// Base ban duration
	pub default_ban_ms: i64,
	/// Escalation factor for repeat offenders
	pub recidivism_multiplier: f64,
}

impl BanHammerConfig {
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(get: F) -> ClResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let interval_secs = positive_real(&get, ENV_AGGREGATION_INTERVAL)?;
		let max_requests = positive_real(&get, ENV_MAX_REQUESTS_PER_WINDOW)?;
		let window_secs = positive_real(&get, ENV_RESOLUTION_WINDOW)?;
		let ban_minutes = positive_real(&get, ENV_DEFAULT_BAN_MINUTES)?;
		let multiplier = positive_real(&get, ENV_RECIDIVISM_MULTIPLIER)?;

		let config = Self {
			aggregation_interval_ms: to_ms(ENV_AGGREGATION_INTERVAL, interval_secs * MS_PER_SECOND)?,
			resolution_window_ms: to_ms(ENV_RESOLUTION_WINDOW, window_secs * MS_PER_SECOND)?,
			max_requests_per_window: max_requests,
			default_ban_ms: to_ms(ENV_DEFAULT_BAN_MINUTES, ban_minutes * MS_PER_MINUTE)?,
			recidivism_multiplier: multiplier,
		};
		debug!("ban hammer config: {:?}", config);
		Ok(config)
	}

	/// Ban duration for repeat offenders (`default_ban * multiplier`)
	#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
	pub fn recidivism_ban_ms(&self) -> i64 {
		let ms = (self.default_ban_ms as f64 * self.recidivism_multiplier).round();
		if ms >= i64::MAX as f64 { i64::MAX } else { ms as i64 }
	}
}

/// Settings of the log pruner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PruneConfig {
	pub max_log_entries: u64,
}

impl PruneConfig {
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(get: F) -> ClResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let config = Self { max_log_entries: positive_int(&get, ENV_MAX_LOGS)? };
		debug!("prune config: {:?}", config);
		Ok(config)
	}
}

/// Interprets an environment switch: set, non-empty and not `false`
pub fn env_flag(value: Option<&str>) -> bool {
	value.is_some_and(|v| !v.is_empty() && v != "false")
}

/// `IGNORE_RATE_LIMITS` switch of the serving process
pub fn ignore_rate_limits_from_env() -> bool {
	env_flag(std::env::var(ENV_IGNORE_RATE_LIMITS).ok().as_deref())
}

fn required<F>(get: &F, name: &str) -> ClResult<String>
where
	F: Fn(&str) -> Option<String>,
{
	match get(name) {
		Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
		_ => Err(Error::ConfigError(format!("{} is not set", name))),
	}
}

fn positive_real<F>(get: &F, name: &str) -> ClResult<f64>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = required(get, name)?;
	match raw.parse::<f64>() {
		Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
		_ => Err(Error::ConfigError(format!(
			"{} must be a positive number, got \"{}\"",
			name, raw
		))),
	}
}

fn positive_int<F>(get: &F, name: &str) -> ClResult<u64>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = required(get, name)?;
	match raw.parse::<u64>() {
		Ok(value) if value > 0 => Ok(value),
		_ => Err(Error::ConfigError(format!(
			"{} must be a positive integer, got \"{}\"",
			name, raw
		))),
	}
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_ms(name: &str, ms: f64) -> ClResult<i64> {
	let ms = ms.round();
	if ms < 1.0 || ms >= i64::MAX as f64 {
		return Err(Error::ConfigError(format!("{} is out of range", name)));
	}
	Ok(ms as i64)
}


// vim: ts=4
