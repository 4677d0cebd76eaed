//! Mission recommendation: one candidate per requested difficulty, retrieval-first by default,
//! generation-first for the daily re-roll where freshness is the point.

use std::collections::HashSet;

use time::OffsetDateTime;
use uuid::Uuid;

use compass_domain::{
	day::next_local_midnight,
	path::{Provenance, RecordKind, display_path, is_leaf, is_valid_difficulty, scope_key, validate_path},
	text::dedup_key,
};
use compass_storage::models::{NewRecord, ScopeFilter};

use crate::{
	Candidate, CompassService, Error, Profile, Recommendation, Result, Source, fallback,
	recommend::scaled_target, retrieval::RetrievalMode,
};

#[derive(Clone, Debug)]
pub struct MissionRequest {
	/// Fully-qualified category path; only leaves own missions.
	pub path: Vec<String>,
	/// Requested difficulty band; empty means all five.
	pub difficulties: Vec<i32>,
	pub profile: Profile,
}

#[derive(Clone, Debug)]
pub struct RerollRequest {
	pub user_id: String,
	pub path: Vec<String>,
	pub difficulty: Option<i32>,
	pub profile: Profile,
	/// Records the user already holds for this scope; excluded on top of the day's cache.
	pub active_record_ids: Vec<Uuid>,
}

impl CompassService {
	/// Retrieval fills difficulties up to the retrieval budget from one similarity search;
	/// every difficulty still missing is covered by a single batched generation call.
	pub async fn recommend_missions(&self, req: &MissionRequest) -> Result<Recommendation> {
		let difficulties = validated_difficulties(&req.path, &req.difficulties)?;
		let mut result = Recommendation::default();
		let mut seen = HashSet::new();
		let mut filled: HashSet<i32> = HashSet::new();
		let retrieval_target = scaled_target(difficulties.len() as u32, self.cfg.recommend.rag_ratio);
		let seeds = vec![display_path(&req.path)];
		let filter = ScopeFilter::new(RecordKind::Mission.as_str()).with_path(&req.path);
		let retrieval = if retrieval_target == 0 {
			crate::retrieval::Retrieval::default()
		} else {
			self.retrieve(
				&seeds,
				&filter,
				self.cfg.retrieval.candidate_k,
				self.cfg.retrieval.mission_min_score,
				RetrievalMode::Hybrid,
			)
			.await
		};

		result.degradations.extend(retrieval.degradation);

		for hit in retrieval.hits {
			if filled.len() as u32 >= retrieval_target {
				break;
			}

			let Some(difficulty) = hit.record.level else {
				continue;
			};

			if !difficulties.contains(&difficulty)
				|| filled.contains(&difficulty)
				|| !seen.insert(dedup_key(&hit.record.content))
			{
				continue;
			}

			filled.insert(difficulty);
			result.candidates.push(Candidate {
				record_id: Some(hit.record.record_id),
				path: hit.record.path.clone(),
				content: hit.record.content,
				difficulty: Some(difficulty),
				source: Source::Retrieved,
			});
		}

		result.retrieved_count = result.candidates.len();

		let missing: Vec<i32> =
			difficulties.iter().copied().filter(|d| !filled.contains(d)).collect();

		if !missing.is_empty() {
			let exclusions: Vec<String> =
				result.candidates.iter().map(|c| c.content.clone()).collect();
			let prompt =
				fallback::mission_prompt(&req.path, &missing, 1, &req.profile, &exclusions);
			let (items, degradation) =
				self.generate_items(fallback::MISSION_SYSTEM, &prompt).await;

			result.degradations.extend(degradation);

			for item in items {
				let Some(difficulty) = item.difficulty else {
					continue;
				};

				if !missing.contains(&difficulty) || filled.contains(&difficulty) {
					continue;
				}

				let content = item.content.trim().to_string();

				if content.is_empty() || !seen.insert(dedup_key(&content)) {
					continue;
				}

				filled.insert(difficulty);

				let candidate = self
					.persist_generated(
						&mut result.degradations,
						NewRecord {
							path: req.path.clone(),
							content,
							kind: RecordKind::Mission.as_str().to_string(),
							level: Some(difficulty),
							vector: None,
							label: None,
							provenance: Provenance::Generated.as_str().to_string(),
						},
					)
					.await;

				result.candidates.push(candidate);
			}
		}

		result.candidates.sort_by_key(|c| c.difficulty);
		result.generated_count = result.candidates.len() - result.retrieved_count;

		tracing::info!(
			scope = %scope_key(&req.path),
			retrieved = result.retrieved_count,
			generated = result.generated_count,
			"mission recommendation complete"
		);

		Ok(result)
	}

	/// Per-category recommendation cycles are independent, so a multi-category request runs
	/// them concurrently.
	pub async fn recommend_missions_batch(
		&self,
		requests: &[MissionRequest],
	) -> Vec<Result<Recommendation>> {
		futures::future::join_all(requests.iter().map(|req| self.recommend_missions(req))).await
	}

	/// Generation-first daily re-roll: nothing returned today for this scope may repeat, and
	/// the retry ceiling is the one failure surfaced to the caller.
	pub async fn reroll_today(&self, req: &RerollRequest) -> Result<Recommendation> {
		if req.user_id.trim().is_empty() {
			return Err(Error::InvalidRequest("User id must be non-empty.".to_string()));
		}

		validate_path(&req.path).map_err(|e| Error::InvalidRequest(e.to_string()))?;

		if !is_leaf(&req.path) {
			return Err(Error::InvalidRequest(
				"Missions may only be re-rolled under a fully-qualified category.".to_string(),
			));
		}
		if let Some(difficulty) = req.difficulty
			&& !is_valid_difficulty(difficulty)
		{
			return Err(Error::InvalidRequest(format!("Difficulty {difficulty} is out of range.")));
		}

		let scope = scope_key(&req.path);
		let now = OffsetDateTime::now_utc();
		let ceiling = self.cfg.recommend.retry_ceiling;
		let retries = self.exclusions.retry_count(&req.user_id, &scope, now).await?;

		if retries >= ceiling {
			return Err(Error::RetryExceeded { retries, ceiling });
		}

		let expires_at = next_local_midnight(now, self.cfg.exclusion.utc_offset_hours);

		self.exclusions.record_retry(&req.user_id, &scope, now, expires_at).await?;

		let shown = self.exclusions.shown(&req.user_id, &scope, now).await?;
		let mut excluded_ids: HashSet<Uuid> = shown.into_iter().collect();

		excluded_ids.extend(req.active_record_ids.iter().copied());

		let mut result = Recommendation::default();
		let excluded: Vec<Uuid> = excluded_ids.iter().copied().collect();
		let exclusion_texts = match self.records.fetch_many(&excluded).await {
			Ok(records) => records.into_iter().map(|r| r.content).collect::<Vec<_>>(),
			Err(e) => {
				// Exclusion by id below still holds; only the prompt loses its text hints.
				tracing::warn!(reason = %e, "failed to load exclusion texts");
				result.degradations.push(crate::Degradation {
					stage: crate::Stage::Retrieval,
					reason: e.to_string(),
				});

				Vec::new()
			},
		};
		let mut seen: HashSet<String> =
			exclusion_texts.iter().map(|text| dedup_key(text)).collect();
		let band = match req.difficulty {
			Some(difficulty) => vec![difficulty],
			None => (1..=5).collect(),
		};
		let today_count = self.cfg.recommend.today_count;
		let per_difficulty = (today_count / band.len() as u32).max(1);
		let prompt = fallback::mission_prompt(
			&req.path,
			&band,
			per_difficulty,
			&req.profile,
			&exclusion_texts,
		);
		let (items, degradation) = self.generate_items(fallback::MISSION_SYSTEM, &prompt).await;

		result.degradations.extend(degradation);

		let mut returned_ids = Vec::new();

		for item in items {
			if result.candidates.len() as u32 >= today_count {
				break;
			}

			let content = item.content.trim().to_string();

			if content.is_empty() || !seen.insert(dedup_key(&content)) {
				continue;
			}

			let candidate = self
				.persist_generated(
					&mut result.degradations,
					NewRecord {
						path: req.path.clone(),
						content,
						kind: RecordKind::Mission.as_str().to_string(),
						level: item.difficulty.filter(|d| band.contains(d)),
						vector: None,
						label: None,
						provenance: Provenance::Generated.as_str().to_string(),
					},
				)
				.await;

			// The generator may paraphrase its way back to a record the user already saw; the
			// id check is what actually enforces the day's non-repetition guarantee.
			if let Some(record_id) = candidate.record_id {
				if excluded_ids.contains(&record_id) {
					continue;
				}

				returned_ids.push(record_id);
			}

			result.candidates.push(candidate);
		}

		self.exclusions
			.append_shown(&req.user_id, &scope, &returned_ids, now, expires_at)
			.await?;

		result.generated_count = result.candidates.len();

		tracing::info!(
			scope = %scope,
			user = %req.user_id,
			returned = result.candidates.len(),
			retry = retries + 1,
			"re-roll complete"
		);

		Ok(result)
	}
}

fn validated_difficulties(path: &[String], difficulties: &[i32]) -> Result<Vec<i32>> {
	validate_path(path).map_err(|e| Error::InvalidRequest(e.to_string()))?;

	if !is_leaf(path) {
		return Err(Error::InvalidRequest(
			"Missions may only be recommended under a fully-qualified category.".to_string(),
		));
	}
	if difficulties.is_empty() {
		return Ok((1..=5).collect());
	}
	if let Some(&bad) = difficulties.iter().find(|d| !is_valid_difficulty(**d)) {
		return Err(Error::InvalidRequest(format!("Difficulty {bad} is out of range.")));
	}

	let mut unique: Vec<i32> = difficulties.to_vec();

	unique.sort_unstable();
	unique.dedup();

	Ok(unique)
}
