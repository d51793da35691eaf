//! Request log persistence

use futures::TryStreamExt;
use sqlx::{Row, SqlitePool};

use banhammer_types::{
	bucket::BucketCounter,
	prelude::*,
	types::{BucketCount, RequestEvent},
};

use crate::utils::*;

pub(crate) async fn append(db: &SqlitePool, event: &RequestEvent) -> ClResult<()> {
	sqlx::query(
		"INSERT INTO request_log (ip, key, method, route, status_code, time)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
	)
	.bind(event.ip.as_deref())
	.bind(event.key.as_deref())
	.bind(event.method.as_deref())
	.bind(event.route.as_deref())
	.bind(i64::from(event.status_code))
	.bind(event.timestamp.0)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

/// Streams the identities and timestamps of matching events through a
/// [`BucketCounter`]
pub(crate) async fn count_by_bucket(
	db: &SqlitePool,
	scope: BanScope,
	since: Timestamp,
	resolution_ms: i64,
) -> ClResult<Vec<BucketCount>> {
	let sql = match scope {
		BanScope::Ip => {
			"SELECT ip AS identity, time FROM request_log
			WHERE time >= ?1 AND ip IS NOT NULL AND ip != ''"
		}
		BanScope::Key => {
			"SELECT key AS identity, time FROM request_log
			WHERE time >= ?1 AND key IS NOT NULL AND key != ''"
		}
	};

	let mut counter = BucketCounter::new(resolution_ms);
	let mut rows = sqlx::query(sql).bind(since.0).fetch(db);
	while let Some(row) = rows.try_next().await.inspect_err(inspect).map_err(|_| Error::DbError)? {
		let identity: &str = row.try_get("identity").inspect_err(inspect).map_err(|_| Error::DbError)?;
		let time: i64 = row.try_get("time").inspect_err(inspect).map_err(|_| Error::DbError)?;
		counter.add(identity, Timestamp(time));
	}
	debug!(scope = scope.code(), buckets = counter.len(), "counted request log buckets");

	Ok(counter.into_counts())
}

pub(crate) async fn count(db: &SqlitePool) -> ClResult<u64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM request_log")
		.fetch_one(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(to_count(count))
}

/// Keeps the `max_entries` rows with the highest `log_id`.
///
/// `log_id` is AUTOINCREMENT, so it follows insertion order even when event
/// timestamps do not. The cutoff must be computed in the same statement as
/// the delete, so appends committing meanwhile cannot invalidate it.
pub(crate) async fn prune(db: &SqlitePool, max_entries: u64) -> ClResult<u64> {
	let res = sqlx::query(
		"DELETE FROM request_log WHERE log_id <= (
			SELECT log_id FROM request_log ORDER BY log_id DESC LIMIT 1 OFFSET ?1
		)",
	)
	.bind(to_i64(max_entries))
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected())
}

// vim: ts=4
