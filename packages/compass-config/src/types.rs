use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub recommend: Recommend,
	pub canonicalize: Canonicalize,
	pub exclusion: Exclusion,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generator: GeneratorProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeneratorProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Retrieval {
	/// Similarity floor for category retrieval. The embedding model scores any pair of short
	/// phrases uniformly high, so this sits far above the usual mid-range cut.
	pub category_min_score: f32,
	/// Similarity floor for free-form mission text.
	pub mission_min_score: f32,
	pub candidate_k: u32,
	pub similarity_weight: f32,
	pub usage_weight: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Recommend {
	/// Share of the target count reserved for retrieval; the rest is left to generation for
	/// diversity even when retrieval could satisfy more.
	pub rag_ratio: f32,
	pub max_count: u32,
	pub today_count: u32,
	pub retry_ceiling: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Canonicalize {
	/// Cosine distance ceiling for near-duplicate label reuse, on the 0-2 scale.
	pub max_distance: f32,
	pub max_label_chars: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Exclusion {
	pub utc_offset_hours: i8,
}
