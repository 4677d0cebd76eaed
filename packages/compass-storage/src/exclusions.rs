use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{BoxFuture, Result, db::Db, store::ExclusionStore};

impl ExclusionStore for Db {
	fn shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			let ids: Vec<Uuid> = sqlx::query_scalar(
				"\
SELECT record_id
FROM exclusion_entries
WHERE user_id = $1 AND scope_key = $2 AND expires_at > $3
ORDER BY created_at",
			)
			.bind(user_id)
			.bind(scope_key)
			.bind(now)
			.fetch_all(&self.pool)
			.await?;

			Ok(ids)
		})
	}

	fn append_shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		record_ids: &'a [Uuid],
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if record_ids.is_empty() {
				return Ok(());
			}

			let mut builder = QueryBuilder::new(
				"INSERT INTO exclusion_entries (user_id, scope_key, record_id, expires_at, created_at) ",
			);

			builder.push_values(record_ids, |mut b, record_id| {
				b.push_bind(user_id)
					.push_bind(scope_key)
					.push_bind(record_id)
					.push_bind(expires_at)
					.push_bind(now);
			});
			// Re-appending an id keeps whichever expiry reaches further; entries are never
			// removed within their lifetime.
			builder.push(
				" ON CONFLICT (user_id, scope_key, record_id) DO UPDATE SET expires_at = GREATEST(exclusion_entries.expires_at, EXCLUDED.expires_at)",
			);
			builder.build().execute(&self.pool).await?;

			Ok(())
		})
	}

	fn retry_count<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u32>> {
		Box::pin(async move {
			let count: Option<i32> = sqlx::query_scalar(
				"\
SELECT retry_count
FROM exclusion_retries
WHERE user_id = $1 AND scope_key = $2 AND expires_at > $3",
			)
			.bind(user_id)
			.bind(scope_key)
			.bind(now)
			.fetch_optional(&self.pool)
			.await?;

			Ok(count.unwrap_or(0) as _)
		})
	}

	fn record_retry<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<u32>> {
		Box::pin(async move {
			// An expired row belongs to a previous day and restarts the counter at 1.
			let count: i32 = sqlx::query_scalar(
				"\
INSERT INTO exclusion_retries (user_id, scope_key, retry_count, expires_at, updated_at)
VALUES ($1, $2, 1, $3, $4)
ON CONFLICT (user_id, scope_key) DO UPDATE
SET
	retry_count = CASE
		WHEN exclusion_retries.expires_at > $4 THEN exclusion_retries.retry_count + 1
		ELSE 1
	END,
	expires_at = $3,
	updated_at = $4
RETURNING retry_count",
			)
			.bind(user_id)
			.bind(scope_key)
			.bind(expires_at)
			.bind(now)
			.fetch_one(&self.pool)
			.await?;

			Ok(count as _)
		})
	}
}
