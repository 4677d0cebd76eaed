use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result, db::Db,
	models::{EmbeddingRecord, NewRecord, ScopeFilter, ScoredRecord, UpsertOutcome},
	parse_pg_vector, store::RecordStore, vector_to_pg,
};

const RECORD_COLUMNS: &str = "\
record_id,
path,
content,
kind,
level,
vec::text AS vector_text,
usage_count,
label,
active,
provenance,
created_at,
updated_at";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
	record_id: Uuid,
	path: Vec<String>,
	content: String,
	kind: String,
	level: Option<i32>,
	vector_text: Option<String>,
	usage_count: i64,
	label: Option<String>,
	active: bool,
	provenance: String,
	created_at: OffsetDateTime,
	updated_at: OffsetDateTime,
}
impl RecordRow {
	fn into_record(self) -> Result<EmbeddingRecord> {
		let vector = self.vector_text.as_deref().map(parse_pg_vector).transpose()?;

		Ok(EmbeddingRecord {
			record_id: self.record_id,
			path: self.path,
			content: self.content,
			kind: self.kind,
			level: self.level,
			vector,
			usage_count: self.usage_count,
			label: self.label,
			active: self.active,
			provenance: self.provenance,
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredRow {
	#[sqlx(flatten)]
	record: RecordRow,
	similarity: f32,
}

fn rows_to_records(rows: Vec<RecordRow>) -> Result<Vec<EmbeddingRecord>> {
	rows.into_iter().map(RecordRow::into_record).collect()
}

impl RecordStore for Db {
	fn upsert<'a>(
		&'a self,
		record: &'a NewRecord,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<UpsertOutcome>> {
		Box::pin(async move {
			let vector_text = record.vector.as_deref().map(vector_to_pg);
			let (record_id, inserted, usage_count) = sqlx::query_as::<_, (Uuid, bool, i64)>(
				"\
INSERT INTO embedding_records (
	record_id,
	path,
	content,
	kind,
	level,
	vec,
	usage_count,
	label,
	active,
	provenance,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6::text::vector, 1, $7, TRUE, $8, $9, $9)
ON CONFLICT (path, content) DO UPDATE
SET
	usage_count = embedding_records.usage_count + 1,
	updated_at = $9
RETURNING record_id, (xmax = 0) AS inserted, usage_count",
			)
			.bind(Uuid::new_v4())
			.bind(&record.path)
			.bind(record.content.as_str())
			.bind(record.kind.as_str())
			.bind(record.level)
			.bind(vector_text.as_deref())
			.bind(record.label.as_deref())
			.bind(record.provenance.as_str())
			.bind(now)
			.fetch_one(&self.pool)
			.await?;

			Ok(UpsertOutcome { record_id, inserted, usage_count })
		})
	}

	fn find_exact<'a>(
		&'a self,
		path: &'a [String],
		content: &'a str,
	) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, RecordRow>(&format!(
				"SELECT {RECORD_COLUMNS} FROM embedding_records WHERE path = $1 AND content = $2",
			))
			.bind(path)
			.bind(content)
			.fetch_optional(&self.pool)
			.await?;

			row.map(RecordRow::into_record).transpose()
		})
	}

	fn fetch<'a>(&'a self, record_id: Uuid) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, RecordRow>(&format!(
				"SELECT {RECORD_COLUMNS} FROM embedding_records WHERE record_id = $1",
			))
			.bind(record_id)
			.fetch_optional(&self.pool)
			.await?;

			row.map(RecordRow::into_record).transpose()
		})
	}

	fn fetch_many<'a>(
		&'a self,
		record_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			if record_ids.is_empty() {
				return Ok(Vec::new());
			}

			let rows = sqlx::query_as::<_, RecordRow>(&format!(
				"SELECT {RECORD_COLUMNS} FROM embedding_records WHERE record_id = ANY($1)",
			))
			.bind(record_ids)
			.fetch_all(&self.pool)
			.await?;

			rows_to_records(rows)
		})
	}

	fn search_similar<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a ScopeFilter,
		limit: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<ScoredRecord>>> {
		Box::pin(async move {
			let vector_text = vector_to_pg(vector);
			let rows = sqlx::query_as::<_, ScoredRow>(&format!(
				"\
SELECT
	{RECORD_COLUMNS},
	(1 - (vec <=> $1::text::vector))::real AS similarity
FROM embedding_records
WHERE active
	AND vec IS NOT NULL
	AND kind = $2
	AND ($3::int IS NULL OR level = $3)
	AND ($4::text IS NULL OR path[1] = $4)
	AND ($5::text[] IS NULL OR path = $5)
	AND (NOT $6 OR label IS NOT NULL)
	AND ($7::uuid IS NULL OR record_id <> $7)
	AND (1 - (vec <=> $1::text::vector)) >= $8
ORDER BY vec <=> $1::text::vector
LIMIT $9",
			))
			.bind(vector_text.as_str())
			.bind(filter.kind.as_str())
			.bind(filter.level)
			.bind(filter.major.as_deref())
			.bind(filter.path.as_deref())
			.bind(filter.labeled_only)
			.bind(filter.exclude)
			.bind(min_score)
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;

			rows.into_iter()
				.map(|row| {
					Ok(ScoredRecord {
						similarity: row.similarity,
						record: row.record.into_record()?,
					})
				})
				.collect()
		})
	}

	fn most_popular<'a>(
		&'a self,
		filter: &'a ScopeFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			let rows = sqlx::query_as::<_, RecordRow>(&format!(
				"\
SELECT {RECORD_COLUMNS}
FROM embedding_records
WHERE active
	AND kind = $1
	AND ($2::int IS NULL OR level = $2)
	AND ($3::text IS NULL OR path[1] = $3)
	AND ($4::text[] IS NULL OR path = $4)
ORDER BY usage_count DESC, updated_at DESC
LIMIT $5",
			))
			.bind(filter.kind.as_str())
			.bind(filter.level)
			.bind(filter.major.as_deref())
			.bind(filter.path.as_deref())
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;

			rows_to_records(rows)
		})
	}

	fn max_usage<'a>(&'a self, filter: &'a ScopeFilter) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let max: i64 = sqlx::query_scalar(
				"\
SELECT COALESCE(MAX(usage_count), 0)
FROM embedding_records
WHERE active
	AND kind = $1
	AND ($2::int IS NULL OR level = $2)
	AND ($3::text IS NULL OR path[1] = $3)
	AND ($4::text[] IS NULL OR path = $4)",
			)
			.bind(filter.kind.as_str())
			.bind(filter.level)
			.bind(filter.major.as_deref())
			.bind(filter.path.as_deref())
			.fetch_one(&self.pool)
			.await?;

			Ok(max)
		})
	}

	fn increment_usage<'a>(
		&'a self,
		record_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let usage_count: Option<i64> = sqlx::query_scalar(
				"\
UPDATE embedding_records
SET usage_count = usage_count + 1, updated_at = $2
WHERE record_id = $1
RETURNING usage_count",
			)
			.bind(record_id)
			.bind(now)
			.fetch_optional(&self.pool)
			.await?;

			usage_count.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))
		})
	}

	fn set_vector<'a>(
		&'a self,
		record_id: Uuid,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let vector_text = vector_to_pg(vector);
			let result = sqlx::query(
				"\
UPDATE embedding_records
SET vec = $2::text::vector, updated_at = $3
WHERE record_id = $1",
			)
			.bind(record_id)
			.bind(vector_text.as_str())
			.bind(now)
			.execute(&self.pool)
			.await?;

			if result.rows_affected() == 0 {
				return Err(Error::NotFound(format!("Record {record_id} is unknown.")));
			}

			Ok(())
		})
	}

	fn set_label_if_empty<'a>(
		&'a self,
		record_id: Uuid,
		label: &'a str,
		vector: Option<&'a [f32]>,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let vector_text = vector.map(vector_to_pg);
			// One statement so a racing writer cannot interleave between the emptiness check
			// and the write; COALESCE keeps the first label that landed.
			let label_row: Option<Option<String>> = sqlx::query_scalar(
				"\
UPDATE embedding_records
SET
	label = COALESCE(label, $2),
	vec = COALESCE(vec, $3::text::vector),
	updated_at = $4
WHERE record_id = $1
RETURNING label",
			)
			.bind(record_id)
			.bind(label)
			.bind(vector_text.as_deref())
			.bind(now)
			.fetch_optional(&self.pool)
			.await?;

			match label_row {
				Some(Some(winner)) => Ok(winner),
				Some(None) => Ok(label.to_string()),
				None => Err(Error::NotFound(format!("Record {record_id} is unknown."))),
			}
		})
	}

	fn deactivate<'a>(&'a self, record_id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let result = sqlx::query(
				"UPDATE embedding_records SET active = FALSE, updated_at = $2 WHERE record_id = $1",
			)
			.bind(record_id)
			.bind(now)
			.execute(&self.pool)
			.await?;

			if result.rows_affected() == 0 {
				return Err(Error::NotFound(format!("Record {record_id} is unknown.")));
			}

			Ok(())
		})
	}

	fn unlabeled<'a>(
		&'a self,
		kind: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			let rows = sqlx::query_as::<_, RecordRow>(&format!(
				"\
SELECT {RECORD_COLUMNS}
FROM embedding_records
WHERE active AND kind = $1 AND label IS NULL
ORDER BY created_at
LIMIT $2",
			))
			.bind(kind)
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;

			rows_to_records(rows)
		})
	}
}
