//! Best-effort similarity retrieval. Any embedding or store failure here yields zero hits with a
//! recorded degradation; retrieval is an accelerator, never a required path.

use compass_domain::score::{centroid, hybrid_score};
use compass_storage::models::{EmbeddingRecord, ScopeFilter, ScoredRecord};

use crate::{CompassService, Degradation, Stage};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetrievalMode {
	/// Descending cosine similarity.
	Similarity,
	/// Similarity blended with in-scope popularity, ties broken by similarity.
	Hybrid,
}

#[derive(Debug, Default)]
pub(crate) struct Retrieval {
	pub hits: Vec<ScoredRecord>,
	pub degradation: Option<Degradation>,
}
impl Retrieval {
	fn degraded(stage: Stage, reason: String) -> Self {
		tracing::warn!(?stage, %reason, "retrieval degraded to zero hits");

		Self { hits: Vec::new(), degradation: Some(Degradation { stage, reason }) }
	}
}

impl CompassService {
	/// Seed texts are embedded in one call and averaged into a single query centroid.
	pub(crate) async fn retrieve(
		&self,
		seeds: &[String],
		filter: &ScopeFilter,
		target: u32,
		min_score: f32,
		mode: RetrievalMode,
	) -> Retrieval {
		if target == 0 || seeds.is_empty() {
			return Retrieval::default();
		}

		let vectors = match self.embedding.embed(seeds).await {
			Ok(vectors) => vectors,
			Err(e) => return Retrieval::degraded(Stage::Embedding, e.to_string()),
		};
		let Some(query) = centroid(&vectors) else {
			return Retrieval::degraded(
				Stage::Embedding,
				"Seed embeddings have mismatched dimensions.".to_string(),
			);
		};
		// Over-fetch so hybrid re-ranking has room to promote popular entries past the cut.
		let candidate_k = self.cfg.retrieval.candidate_k.max(target);
		let mut hits =
			match self.records.search_similar(&query, filter, candidate_k, min_score).await {
				Ok(hits) => hits,
				Err(e) => return Retrieval::degraded(Stage::Retrieval, e.to_string()),
			};

		if mode == RetrievalMode::Hybrid {
			let max_usage = match self.records.max_usage(filter).await {
				Ok(max_usage) => max_usage,
				Err(e) => return Retrieval::degraded(Stage::Retrieval, e.to_string()),
			};
			let score = |hit: &ScoredRecord| {
				hybrid_score(
					hit.similarity,
					hit.record.usage_count,
					max_usage,
					self.cfg.retrieval.similarity_weight,
					self.cfg.retrieval.usage_weight,
				)
			};

			hits.sort_by(|a, b| {
				score(b).total_cmp(&score(a)).then_with(|| b.similarity.total_cmp(&a.similarity))
			});
		}

		hits.truncate(target as usize);

		Retrieval { hits, degradation: None }
	}

	/// Cold-start ordering: no selection context means no similarity query, only popularity.
	pub(crate) async fn popular(
		&self,
		filter: &ScopeFilter,
		limit: u32,
	) -> (Vec<EmbeddingRecord>, Option<Degradation>) {
		match self.records.most_popular(filter, limit).await {
			Ok(records) => (records, None),
			Err(e) => {
				tracing::warn!(reason = %e, "popularity fallback degraded to zero hits");

				(Vec::new(), Some(Degradation { stage: Stage::Retrieval, reason: e.to_string() }))
			},
		}
	}
}
