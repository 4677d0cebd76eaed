use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Result,
	models::{EmbeddingRecord, NewRecord, ScopeFilter, ScoredRecord, UpsertOutcome},
};

/// Contract of the Embedding Record Store. The production implementation lives on
/// [`crate::db::Db`]; tests run against an in-memory double.
pub trait RecordStore
where
	Self: Send + Sync,
{
	/// Atomic insert-or-increment on the `(path, content)` natural key. Concurrent writers
	/// targeting the same key must converge on one record whose `usage_count` equals the
	/// number of upserts.
	fn upsert<'a>(
		&'a self,
		record: &'a NewRecord,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<UpsertOutcome>>;

	fn find_exact<'a>(
		&'a self,
		path: &'a [String],
		content: &'a str,
	) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>>;

	fn fetch<'a>(&'a self, record_id: Uuid) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>>;

	fn fetch_many<'a>(&'a self, record_ids: &'a [Uuid])
	-> BoxFuture<'a, Result<Vec<EmbeddingRecord>>>;

	/// Nearest-neighbor ranking by cosine similarity, descending, excluding entries below
	/// `min_score` and records without a vector.
	fn search_similar<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a ScopeFilter,
		limit: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>>;

	/// Cold-start ordering: most-used active records in scope, no similarity involved.
	fn most_popular<'a>(
		&'a self,
		filter: &'a ScopeFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>>;

	fn max_usage<'a>(&'a self, filter: &'a ScopeFilter) -> BoxFuture<'a, Result<i64>>;

	fn increment_usage<'a>(
		&'a self,
		record_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<i64>>;

	/// Replaces the vector. Vectors are never cleared, only replaced by explicit re-embedding.
	fn set_vector<'a>(
		&'a self,
		record_id: Uuid,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	/// Write-once label assignment. Returns the label that won, which may be a concurrent
	/// writer's value rather than `label`.
	fn set_label_if_empty<'a>(
		&'a self,
		record_id: Uuid,
		label: &'a str,
		vector: Option<&'a [f32]>,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<String>>;

	fn deactivate<'a>(&'a self, record_id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<()>>;

	fn unlabeled<'a>(
		&'a self,
		kind: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>>;
}

/// Contract of the per-user, per-scope, day-boxed Exclusion Cache.
pub trait ExclusionStore
where
	Self: Send + Sync,
{
	fn shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;

	/// Additive merge: existing entries are kept, new ids are appended with the given expiry.
	fn append_shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		record_ids: &'a [Uuid],
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn retry_count<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u32>>;

	/// Increments and returns the day's retry counter, restarting it when the previous day's
	/// entry has expired.
	fn record_retry<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<u32>>;
}
