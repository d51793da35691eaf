//! Error type shared by every banhammer crate.

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Storage failure, the driver error is logged where it happens
	DbError,
	/// Missing or invalid configuration value
	ConfigError(String),
	/// Another holder owns the requested resource (e.g. a job lock)
	Conflict(String),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::DbError => write!(f, "database error"),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Conflict(msg) => write!(f, "conflict: {}", msg),
		}
	}
}

impl std::error::Error for Error {}


// vim: ts=4
