//! Advisory job locks

use sqlx::SqlitePool;

use banhammer_types::prelude::*;

use crate::utils::*;

/// Inserts the lock row, or takes it over when it has expired.
///
/// The upsert is a single statement, so two racing runs cannot both succeed.
pub(crate) async fn try_acquire(
	db: &SqlitePool,
	name: &str,
	holder: &str,
	now: Timestamp,
	expires_at: Timestamp,
) -> ClResult<bool> {
	let res = sqlx::query(
		"INSERT INTO job_locks (name, holder, expires_at) VALUES (?1, ?2, ?3)
		ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
		WHERE job_locks.expires_at < ?4 OR job_locks.holder = excluded.holder",
	)
	.bind(name)
	.bind(holder)
	.bind(expires_at.0)
	.bind(now.0)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected() == 1)
}

pub(crate) async fn release(db: &SqlitePool, name: &str, holder: &str) -> ClResult<()> {
	sqlx::query("DELETE FROM job_locks WHERE name = ?1 AND holder = ?2")
		.bind(name)
		.bind(holder)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(())
}

// vim: ts=4
