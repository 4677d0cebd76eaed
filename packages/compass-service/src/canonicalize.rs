//! Label canonicalization. An unlabeled record is embedded, matched against already-labeled
//! neighbors, and either adopts a neighbor's label verbatim or receives a freshly generated
//! one. Labels are write-once; a record that cannot be labeled now stays unlabeled for a later
//! pass rather than getting a placeholder.

use time::OffsetDateTime;
use uuid::Uuid;

use compass_domain::{
	label::normalize_label,
	path::{Provenance, RecordKind, validate_path},
	text::strip_code_fences,
};
use compass_storage::models::{EmbeddingRecord, NewRecord, ScopeFilter};

use crate::{CompassService, Error, Result, Stage, context_text, fallback};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CanonicalizeAction {
	/// Terminal state was already reached; nothing was called.
	AlreadyLabeled,
	/// A near-duplicate labeled neighbor was found; its label was adopted with no generative
	/// call.
	ReusedExisting,
	/// No neighbor qualified; a new label was generated and persisted.
	Generated,
	/// The named stage failed; the record stays unlabeled for a future pass.
	Deferred { stage: Stage },
}

#[derive(Debug)]
pub struct CanonicalizeOutcome {
	pub record_id: Uuid,
	pub label: Option<String>,
	pub action: CanonicalizeAction,
}

impl CompassService {
	pub async fn canonicalize_record(&self, record_id: Uuid) -> Result<CanonicalizeOutcome> {
		let record = self
			.records
			.fetch(record_id)
			.await?
			.ok_or_else(|| Error::NotFound(format!("Record {record_id} is unknown.")))?;

		if let Some(label) = record.label.clone() {
			return Ok(CanonicalizeOutcome {
				record_id,
				label: Some(label),
				action: CanonicalizeAction::AlreadyLabeled,
			});
		}

		// Embedding failure skips the similarity search rather than blocking the batch.
		let vector = match self.embed_record(&record).await {
			Ok(vector) => Some(vector),
			Err(e) => {
				tracing::warn!(record_id = %record_id, reason = %e, "canonicalization embed failed");

				None
			},
		};

		if let Some(vector) = vector.as_deref()
			&& let Some(label) = self.find_reusable_label(&record, vector).await
		{
			let winner = self
				.records
				.set_label_if_empty(record_id, &label, Some(vector), OffsetDateTime::now_utc())
				.await?;

			return Ok(CanonicalizeOutcome {
				record_id,
				label: Some(winner),
				action: CanonicalizeAction::ReusedExisting,
			});
		}

		let Some(label) = self.generate_label(&record).await else {
			return Ok(CanonicalizeOutcome {
				record_id,
				label: None,
				action: CanonicalizeAction::Deferred { stage: Stage::Generation },
			});
		};
		let winner = self
			.records
			.set_label_if_empty(record_id, &label, vector.as_deref(), OffsetDateTime::now_utc())
			.await?;

		Ok(CanonicalizeOutcome {
			record_id,
			label: Some(winner),
			action: CanonicalizeAction::Generated,
		})
	}

	/// Upserts the raw text under its scope first, then canonicalizes the backing record, so
	/// repeated submissions of the same sentence converge on one labeled entry.
	pub async fn canonicalize_text(
		&self,
		path: &[String],
		content: &str,
		kind: RecordKind,
	) -> Result<CanonicalizeOutcome> {
		validate_path(path).map_err(|e| Error::InvalidRequest(e.to_string()))?;

		let content = content.trim();

		if content.is_empty() {
			return Err(Error::InvalidRequest("Content must be non-empty.".to_string()));
		}

		let record = NewRecord {
			path: path.to_vec(),
			content: content.to_string(),
			kind: kind.as_str().to_string(),
			level: None,
			vector: None,
			label: None,
			provenance: Provenance::User.as_str().to_string(),
		};
		let outcome = self.records.upsert(&record, OffsetDateTime::now_utc()).await?;

		self.canonicalize_record(outcome.record_id).await
	}

	async fn embed_record(&self, record: &EmbeddingRecord) -> color_eyre::Result<Vec<f32>> {
		let seeds = vec![context_text(&record.path, &record.content)];
		let mut vectors = self.embedding.embed(&seeds).await?;

		vectors
			.pop()
			.ok_or_else(|| color_eyre::eyre::eyre!("Embedding provider returned no vectors."))
	}

	/// Near-duplicate detection runs at a much tighter threshold than topical retrieval and
	/// only trusts records that already carry a label.
	async fn find_reusable_label(
		&self,
		record: &EmbeddingRecord,
		vector: &[f32],
	) -> Option<String> {
		let min_score = 1.0 - self.cfg.canonicalize.max_distance;
		let filter = ScopeFilter::new(&record.kind).labeled_only().excluding(record.record_id);
		let hits = match self.records.search_similar(vector, &filter, 1, min_score).await {
			Ok(hits) => hits,
			Err(e) => {
				tracing::warn!(reason = %e, "label-reuse search failed");

				return None;
			},
		};

		hits.into_iter().next().and_then(|hit| hit.record.label)
	}

	async fn generate_label(&self, record: &EmbeddingRecord) -> Option<String> {
		let prompt = fallback::label_prompt(
			&record.path,
			&record.content,
			self.cfg.canonicalize.max_label_chars,
		);
		let raw = match self.generator.generate(fallback::LABEL_SYSTEM, &prompt).await {
			Ok(raw) => raw,
			Err(e) => {
				tracing::warn!(reason = %e, "label generation failed");

				return None;
			},
		};
		let label = match fallback::parse_label(&raw) {
			Ok(label) => label,
			// Some generators answer with the bare label instead of the JSON wrapper.
			Err(_) => strip_code_fences(&raw).to_string(),
		};

		match normalize_label(&label, self.cfg.canonicalize.max_label_chars) {
			Some(label) => Some(label),
			None => {
				tracing::warn!(raw = %label, "generated label violated the contract");

				None
			},
		}
	}
}
