//! Ban table persistence

use sqlx::{Row, SqlitePool};

use banhammer_types::{prelude::*, types::BanEntry};

use crate::utils::*;

/// Rows per INSERT statement (3 bound parameters each)
const INSERT_CHUNK: usize = 300;

pub(crate) async fn list(db: &SqlitePool, since: Timestamp) -> ClResult<Vec<BanEntry>> {
	let res = sqlx::query(
		"SELECT scope, identity, until FROM bans
		WHERE until >= ?1
		ORDER BY scope, identity",
	)
	.bind(since.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(|row| {
		let scope: &str = row.try_get("scope")?;
		let scope = BanScope::from_code(scope)
			.ok_or_else(|| sqlx::Error::Decode(format!("invalid ban scope '{}'", scope).into()))?;
		let identity: &str = row.try_get("identity")?;
		Ok(BanEntry::new(Identity::new(scope, identity), Timestamp(row.try_get("until")?)))
	}))
}

/// Swaps the table content inside one transaction.
///
/// Readers keep seeing the previous content until the commit.
pub(crate) async fn replace(db: &SqlitePool, bans: &[BanEntry]) -> ClResult<()> {
	let mut tx = db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	sqlx::query("DELETE FROM bans")
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	for chunk in bans.chunks(INSERT_CHUNK) {
		let mut query = sqlx::QueryBuilder::<sqlx::Sqlite>::new("INSERT INTO bans (scope, identity, until) ");
		query.push_values(chunk, |mut row, ban| {
			row.push_bind(ban.identity.scope().code())
				.push_bind(ban.identity.value())
				.push_bind(ban.until.0);
		});
		// duplicates keep the latest expiry
		query.push(" ON CONFLICT(scope, identity) DO UPDATE SET until = max(until, excluded.until)");
		query
			.build()
			.execute(&mut *tx)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;
	}

	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn find_active(
	db: &SqlitePool,
	ip: Option<&str>,
	key: Option<&str>,
	now: Timestamp,
) -> ClResult<Option<Timestamp>> {
	let until: Option<i64> = sqlx::query_scalar(
		"SELECT max(until) FROM bans
		WHERE until > ?1
		AND ((scope = 'I' AND identity = ?2) OR (scope = 'K' AND identity = ?3))",
	)
	.bind(now.0)
	.bind(ip)
	.bind(key)
	.fetch_one(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(until.map(Timestamp))
}

// vim: ts=4
