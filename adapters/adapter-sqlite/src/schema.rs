//! Database schema initialization

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Request log
	//*************
	// log_id is AUTOINCREMENT so ids are never reused: pruning relies on
	// log_id order being insertion order.
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS request_log (
		log_id integer PRIMARY KEY AUTOINCREMENT,
		ip text,
		key text,
		method text,
		route text,
		status_code integer NOT NULL,
		time integer NOT NULL		-- epoch milliseconds
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_request_log_time ON request_log(time)")
		.execute(&mut *tx)
		.await?;

	// Bans
	//******
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS bans (
		scope char(1) NOT NULL,		-- 'I' - ip, 'K' - key
		identity text NOT NULL,
		until integer NOT NULL,		-- epoch milliseconds
		PRIMARY KEY(scope, identity)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_bans_until ON bans(until)")
		.execute(&mut *tx)
		.await?;

	// Job locks
	//***********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS job_locks (
		name text NOT NULL,
		holder text NOT NULL,
		expires_at integer NOT NULL,
		PRIMARY KEY(name)
	)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
