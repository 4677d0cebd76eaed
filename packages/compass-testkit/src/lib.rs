//! In-memory doubles of the storage contracts. Test-only; production code always goes through
//! Postgres.

use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;
use uuid::Uuid;

use compass_domain::score::cosine_similarity;
use compass_storage::{
	BoxFuture, Error, Result,
	models::{EmbeddingRecord, NewRecord, ScopeFilter, ScoredRecord, UpsertOutcome},
	store::{ExclusionStore, RecordStore},
};

#[derive(Default)]
pub struct InMemoryRecordStore {
	records: Mutex<Vec<EmbeddingRecord>>,
}
impl InMemoryRecordStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn seed(&self, record: EmbeddingRecord) {
		self.lock().push(record);
	}

	pub fn snapshot(&self) -> Vec<EmbeddingRecord> {
		self.lock().clone()
	}

	fn lock(&self) -> MutexGuard<'_, Vec<EmbeddingRecord>> {
		self.records.lock().expect("record store lock poisoned")
	}
}

fn matches_filter(record: &EmbeddingRecord, filter: &ScopeFilter) -> bool {
	record.active
		&& record.kind == filter.kind
		&& filter.level.is_none_or(|level| record.level == Some(level))
		&& filter.major.as_deref().is_none_or(|major| record.path.first().map(String::as_str) == Some(major))
		&& filter.path.as_deref().is_none_or(|path| record.path == path)
		&& (!filter.labeled_only || record.label.is_some())
		&& filter.exclude.is_none_or(|excluded| record.record_id != excluded)
}

impl RecordStore for InMemoryRecordStore {
	fn upsert<'a>(
		&'a self,
		record: &'a NewRecord,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<UpsertOutcome>> {
		Box::pin(async move {
			let mut records = self.lock();

			if let Some(existing) = records
				.iter_mut()
				.find(|r| r.path == record.path && r.content == record.content)
			{
				existing.usage_count += 1;
				existing.updated_at = now;

				return Ok(UpsertOutcome {
					record_id: existing.record_id,
					inserted: false,
					usage_count: existing.usage_count,
				});
			}

			let record_id = Uuid::new_v4();

			records.push(EmbeddingRecord {
				record_id,
				path: record.path.clone(),
				content: record.content.clone(),
				kind: record.kind.clone(),
				level: record.level,
				vector: record.vector.clone(),
				usage_count: 1,
				label: record.label.clone(),
				active: true,
				provenance: record.provenance.clone(),
				created_at: now,
				updated_at: now,
			});

			Ok(UpsertOutcome { record_id, inserted: true, usage_count: 1 })
		})
	}

	fn find_exact<'a>(
		&'a self,
		path: &'a [String],
		content: &'a str,
	) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>> {
		Box::pin(async move {
			Ok(self
				.lock()
				.iter()
				.find(|r| r.path == path && r.content == content)
				.cloned())
		})
	}

	fn fetch<'a>(&'a self, record_id: Uuid) -> BoxFuture<'a, Result<Option<EmbeddingRecord>>> {
		Box::pin(
			async move { Ok(self.lock().iter().find(|r| r.record_id == record_id).cloned()) },
		)
	}

	fn fetch_many<'a>(
		&'a self,
		record_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			Ok(self
				.lock()
				.iter()
				.filter(|r| record_ids.contains(&r.record_id))
				.cloned()
				.collect())
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
			let mut scored: Vec<ScoredRecord> = self
				.lock()
				.iter()
				.filter(|r| matches_filter(r, filter))
				.filter_map(|r| {
					let similarity = cosine_similarity(r.vector.as_deref()?, vector);

					(similarity >= min_score)
						.then(|| ScoredRecord { record: r.clone(), similarity })
				})
				.collect();

			scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
			scored.truncate(limit as usize);

			Ok(scored)
		})
	}

	fn most_popular<'a>(
		&'a self,
		filter: &'a ScopeFilter,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			let mut records: Vec<EmbeddingRecord> =
				self.lock().iter().filter(|r| matches_filter(r, filter)).cloned().collect();

			records.sort_by(|a, b| {
				b.usage_count
					.cmp(&a.usage_count)
					.then_with(|| b.updated_at.cmp(&a.updated_at))
			});
			records.truncate(limit as usize);

			Ok(records)
		})
	}

	fn max_usage<'a>(&'a self, filter: &'a ScopeFilter) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			Ok(self
				.lock()
				.iter()
				.filter(|r| matches_filter(r, filter))
				.map(|r| r.usage_count)
				.max()
				.unwrap_or(0))
		})
	}

	fn increment_usage<'a>(
		&'a self,
		record_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let mut records = self.lock();
			let record = records
				.iter_mut()
				.find(|r| r.record_id == record_id)
				.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

			record.usage_count += 1;
			record.updated_at = now;

			Ok(record.usage_count)
		})
	}

	fn set_vector<'a>(
		&'a self,
		record_id: Uuid,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut records = self.lock();
			let record = records
				.iter_mut()
				.find(|r| r.record_id == record_id)
				.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

			record.vector = Some(vector.to_vec());
			record.updated_at = now;

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
			let mut records = self.lock();
			let record = records
				.iter_mut()
				.find(|r| r.record_id == record_id)
				.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

			if record.label.is_none() {
				record.label = Some(label.to_string());
			}
			if record.vector.is_none() {
				record.vector = vector.map(<[f32]>::to_vec);
			}

			record.updated_at = now;

			Ok(record.label.clone().unwrap_or_default())
		})
	}

	fn deactivate<'a>(&'a self, record_id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut records = self.lock();
			let record = records
				.iter_mut()
				.find(|r| r.record_id == record_id)
				.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

			record.active = false;
			record.updated_at = now;

			Ok(())
		})
	}

	fn unlabeled<'a>(
		&'a self,
		kind: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EmbeddingRecord>>> {
		Box::pin(async move {
			let mut records: Vec<EmbeddingRecord> = self
				.lock()
				.iter()
				.filter(|r| r.active && r.kind == kind && r.label.is_none())
				.cloned()
				.collect();

			records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
			records.truncate(limit as usize);

			Ok(records)
		})
	}
}

#[derive(Clone, Debug)]
struct ShownEntry {
	record_id: Uuid,
	expires_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug)]
struct RetryEntry {
	retry_count: u32,
	expires_at: OffsetDateTime,
}

#[derive(Default)]
pub struct InMemoryExclusionStore {
	shown: Mutex<HashMap<(String, String), Vec<ShownEntry>>>,
	retries: Mutex<HashMap<(String, String), RetryEntry>>,
}
impl InMemoryExclusionStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl ExclusionStore for InMemoryExclusionStore {
	fn shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			let shown = self.shown.lock().expect("exclusion store lock poisoned");

			Ok(shown
				.get(&(user_id.to_string(), scope_key.to_string()))
				.map(|entries| {
					entries
						.iter()
						.filter(|e| e.expires_at > now)
						.map(|e| e.record_id)
						.collect()
				})
				.unwrap_or_default())
		})
	}

	fn append_shown<'a>(
		&'a self,
		user_id: &'a str,
		scope_key: &'a str,
		record_ids: &'a [Uuid],
		_now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut shown = self.shown.lock().expect("exclusion store lock poisoned");
			let entries =
				shown.entry((user_id.to_string(), scope_key.to_string())).or_default();

			for &record_id in record_ids {
				if let Some(existing) =
					entries.iter_mut().find(|e| e.record_id == record_id)
				{
					existing.expires_at = existing.expires_at.max(expires_at);
				} else {
					entries.push(ShownEntry { record_id, expires_at });
				}
			}

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
			let retries = self.retries.lock().expect("exclusion store lock poisoned");

			Ok(retries
				.get(&(user_id.to_string(), scope_key.to_string()))
				.filter(|e| e.expires_at > now)
				.map(|e| e.retry_count)
				.unwrap_or(0))
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
			let mut retries = self.retries.lock().expect("exclusion store lock poisoned");
			let entry = retries
				.entry((user_id.to_string(), scope_key.to_string()))
				.or_insert(RetryEntry { retry_count: 0, expires_at });

			if entry.expires_at <= now {
				entry.retry_count = 0;
			}

			entry.retry_count += 1;
			entry.expires_at = expires_at;

			Ok(entry.retry_count)
		})
	}
}
