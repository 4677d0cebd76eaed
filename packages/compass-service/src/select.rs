//! Selection is the moment a candidate proves its worth: usage is counted and the embedding,
//! deferred at persistence time, is finally paid for.

use time::OffsetDateTime;
use uuid::Uuid;

use compass_storage::models::EmbeddingRecord;

use crate::{CompassService, Degradation, Error, Result, Stage, context_text};

#[derive(Debug)]
pub struct SelectionOutcome {
	pub record: EmbeddingRecord,
	pub usage_count: i64,
	/// Whether this call produced the record's embedding.
	pub embedded: bool,
	pub degradation: Option<Degradation>,
}

impl CompassService {
	pub async fn select_record(&self, record_id: Uuid) -> Result<SelectionOutcome> {
		let record = self
			.records
			.fetch(record_id)
			.await?
			.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

		if !record.active {
			return Err(Error::InvalidRequest(format!(
				"Record {record_id} is inactive and cannot be selected."
			)));
		}

		let now = OffsetDateTime::now_utc();
		let usage_count = self.records.increment_usage(record_id, now).await?;
		let mut embedded = false;
		let mut degradation = None;

		if record.vector.is_none() {
			let seed = vec![context_text(&record.path, &record.content)];

			match self.embedding.embed(&seed).await {
				Ok(vectors) if !vectors.is_empty() => {
					self.records.set_vector(record_id, &vectors[0], now).await?;

					embedded = true;
				},
				Ok(_) => {
					degradation = Some(Degradation {
						stage: Stage::Embedding,
						reason: "Embedding provider returned no vectors.".to_string(),
					});
				},
				Err(e) => {
					// The selection itself stands; the embedding is retried on a later pass.
					tracing::warn!(reason = %e, "lazy embedding failed at selection time");

					degradation =
						Some(Degradation { stage: Stage::Embedding, reason: e.to_string() });
				},
			}
		}

		Ok(SelectionOutcome { record, usage_count, embedded, degradation })
	}
}
