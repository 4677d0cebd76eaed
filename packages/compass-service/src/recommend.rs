//! Interest-category recommendation: retrieval first, generation for the shortfall, merge,
//! dedup, persist what is new.

use std::collections::HashSet;

use compass_domain::{
	path::{Provenance, RecordKind, display_path, is_valid_level, validate_path},
	text::dedup_key,
};
use compass_storage::models::{NewRecord, ScopeFilter};

use crate::{
	Candidate, CompassService, Degradation, Error, Profile, Recommendation, Result, Source, Stage,
	fallback,
	retrieval::RetrievalMode,
};

#[derive(Clone, Debug)]
pub struct InterestRequest {
	/// Paths the user has already chosen; seeds for the retrieval centroid. Empty means cold
	/// start.
	pub selected: Vec<Vec<String>>,
	pub target_level: i32,
	pub count: u32,
	pub profile: Profile,
	pub mode: RetrievalMode,
}

impl CompassService {
	pub async fn recommend_interests(&self, req: &InterestRequest) -> Result<Recommendation> {
		self.validate_interest_request(req)?;

		let filter = ScopeFilter::new(RecordKind::Category.as_str()).with_level(req.target_level);
		let mut result = Recommendation::default();
		let mut seen = HashSet::new();

		if req.selected.is_empty() {
			// Cold start: popularity stands in for the whole retrieval budget, so a full
			// catalog satisfies the request without a generative call.
			let (records, degradation) = self.popular(&filter, req.count).await;

			result.degradations.extend(degradation);

			for record in records {
				if seen.insert(dedup_key(&record.content)) {
					result.candidates.push(Candidate {
						record_id: Some(record.record_id),
						path: record.path.clone(),
						content: record.content,
						difficulty: None,
						source: Source::Retrieved,
					});
				}
			}
		} else {
			// Retrieval is deliberately asked for less than the full target, reserving room
			// for generative diversity.
			let retrieval_target = scaled_target(req.count, self.cfg.recommend.rag_ratio);
			let seeds: Vec<String> =
				req.selected.iter().map(|path| display_path(path)).collect();
			let retrieval = self
				.retrieve(
					&seeds,
					&filter,
					retrieval_target,
					self.cfg.retrieval.category_min_score,
					req.mode,
				)
				.await;

			result.degradations.extend(retrieval.degradation);

			for hit in retrieval.hits {
				if seen.insert(dedup_key(&hit.record.content)) {
					result.candidates.push(Candidate {
						record_id: Some(hit.record.record_id),
						path: hit.record.path.clone(),
						content: hit.record.content,
						difficulty: None,
						source: Source::Retrieved,
					});
				}
			}
		}

		result.retrieved_count = result.candidates.len();

		let shortfall = (req.count as usize).saturating_sub(result.candidates.len());

		if shortfall > 0 {
			let exclusions: Vec<String> =
				result.candidates.iter().map(|c| c.content.clone()).collect();
			let prompt = fallback::interest_prompt(
				&req.selected,
				req.target_level,
				shortfall as u32,
				&req.profile,
				&exclusions,
			);
			let (items, degradation) =
				self.generate_items(fallback::INTEREST_SYSTEM, &prompt).await;

			result.degradations.extend(degradation);

			for item in items {
				if result.candidates.len() >= req.count as usize {
					break;
				}

				let content = item.content.trim().to_string();

				if content.is_empty() || !seen.insert(dedup_key(&content)) {
					continue;
				}

				let path = self.category_path(req, &content);
				let candidate = self
					.persist_generated(
						&mut result.degradations,
						NewRecord {
							path,
							content,
							kind: RecordKind::Category.as_str().to_string(),
							level: Some(req.target_level),
							vector: None,
							label: None,
							provenance: Provenance::Generated.as_str().to_string(),
						},
					)
					.await;

				result.candidates.push(candidate);
			}
		}

		result.candidates.truncate(req.count as usize);
		result.generated_count = result.candidates.len() - result.retrieved_count;

		tracing::info!(
			retrieved = result.retrieved_count,
			generated = result.generated_count,
			degraded = result.degradations.len(),
			"interest recommendation complete"
		);

		Ok(result)
	}

	fn validate_interest_request(&self, req: &InterestRequest) -> Result<()> {
		if req.count == 0 || req.count > self.cfg.recommend.max_count {
			return Err(Error::InvalidRequest(format!(
				"Count must be between 1 and {}.",
				self.cfg.recommend.max_count
			)));
		}
		if !is_valid_level(req.target_level) {
			return Err(Error::InvalidRequest(format!(
				"Level {} is out of range.",
				req.target_level
			)));
		}
		for path in &req.selected {
			validate_path(path).map_err(|e| Error::InvalidRequest(e.to_string()))?;
		}

		Ok(())
	}

	/// A generated category at depth N slots under the first selected (N-1)-deep path; at the
	/// top level, or with no suitable parent, it starts its own path.
	fn category_path(&self, req: &InterestRequest, content: &str) -> Vec<String> {
		let parent = req
			.selected
			.iter()
			.find(|path| path.len() + 1 == req.target_level as usize);

		match parent {
			Some(parent) => {
				let mut path = parent.clone();

				path.push(content.to_string());

				path
			},
			None => vec![content.to_string()],
		}
	}

	/// Generated candidates are persisted without a vector; embedding waits for selection.
	pub(crate) async fn persist_generated(
		&self,
		degradations: &mut Vec<Degradation>,
		record: NewRecord,
	) -> Candidate {
		let mut candidate = Candidate {
			record_id: None,
			path: record.path.clone(),
			content: record.content.clone(),
			difficulty: record.level.filter(|_| record.kind == RecordKind::Mission.as_str()),
			source: Source::Generated,
		};

		match self.records.upsert(&record, time::OffsetDateTime::now_utc()).await {
			Ok(outcome) => candidate.record_id = Some(outcome.record_id),
			Err(e) => {
				tracing::warn!(reason = %e, "failed to persist a generated candidate");

				degradations
					.push(Degradation { stage: Stage::Persistence, reason: e.to_string() });
			},
		}

		candidate
	}
}

pub(crate) fn scaled_target(count: u32, rag_ratio: f32) -> u32 {
	(count as f32 * rag_ratio).floor() as u32
}
