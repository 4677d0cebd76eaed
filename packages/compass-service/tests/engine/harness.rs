//! Shared fixtures: a configuration with known knobs, scripted provider doubles, and record
//! builders for seeding the in-memory store.

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
};

use time::OffsetDateTime;
use uuid::Uuid;

use compass_config::{
	Canonicalize, Config, EmbeddingProviderConfig, Exclusion, GeneratorProviderConfig, Postgres,
	Providers, Recommend, Retrieval, Service, Storage,
};
use compass_service::{CompassService, EmbeddingProvider, GeneratorProvider};
use compass_storage::{BoxFuture, models::EmbeddingRecord};
use compass_testkit::{InMemoryExclusionStore, InMemoryRecordStore};

pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "warn".to_string() },
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://localhost/compass_test".to_string(),
				pool_max_conns: 1,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "unused".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "stub-embedding".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			generator: GeneratorProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "unused".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "stub-generator".to_string(),
				temperature: 0.7,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		retrieval: Retrieval {
			category_min_score: 0.9,
			mission_min_score: 0.5,
			candidate_k: 50,
			similarity_weight: 0.7,
			usage_weight: 0.3,
		},
		recommend: Recommend { rag_ratio: 0.7, max_count: 10, today_count: 5, retry_ceiling: 3 },
		canonicalize: Canonicalize { max_distance: 0.35, max_label_chars: 20 },
		exclusion: Exclusion { utc_offset_hours: 9 },
	}
}

/// Embedding double: returns a mapped vector per exact text, or the default.
pub struct StubEmbedding {
	vectors: Mutex<HashMap<String, Vec<f32>>>,
	default: Vec<f32>,
	failing: Mutex<bool>,
	calls: Mutex<u32>,
}
impl StubEmbedding {
	pub fn new(default: Vec<f32>) -> Arc<Self> {
		Arc::new(Self {
			vectors: Mutex::new(HashMap::new()),
			default,
			failing: Mutex::new(false),
			calls: Mutex::new(0),
		})
	}

	pub fn map(&self, text: &str, vector: Vec<f32>) {
		self.vectors.lock().unwrap().insert(text.to_string(), vector);
	}

	pub fn set_failing(&self, failing: bool) {
		*self.failing.lock().unwrap() = failing;
	}

	pub fn calls(&self) -> u32 {
		*self.calls.lock().unwrap()
	}
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			*self.calls.lock().unwrap() += 1;

			if *self.failing.lock().unwrap() {
				return Err(color_eyre::eyre::eyre!("embedding service unavailable"));
			}

			let vectors = self.vectors.lock().unwrap();

			Ok(texts
				.iter()
				.map(|text| vectors.get(text).cloned().unwrap_or_else(|| self.default.clone()))
				.collect())
		})
	}
}

/// Generator double: pops scripted responses in order and records every prompt it saw.
pub struct SpyGenerator {
	responses: Mutex<VecDeque<String>>,
	prompts: Mutex<Vec<String>>,
	failing: Mutex<bool>,
}
impl SpyGenerator {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			responses: Mutex::new(VecDeque::new()),
			prompts: Mutex::new(Vec::new()),
			failing: Mutex::new(false),
		})
	}

	pub fn script(&self, response: &str) {
		self.responses.lock().unwrap().push_back(response.to_string());
	}

	pub fn set_failing(&self, failing: bool) {
		*self.failing.lock().unwrap() = failing;
	}

	pub fn calls(&self) -> usize {
		self.prompts.lock().unwrap().len()
	}

	pub fn prompts(&self) -> Vec<String> {
		self.prompts.lock().unwrap().clone()
	}
}
impl GeneratorProvider for SpyGenerator {
	fn generate<'a>(
		&'a self,
		_system_instruction: &'a str,
		user_prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			self.prompts.lock().unwrap().push(user_prompt.to_string());

			if *self.failing.lock().unwrap() {
				return Err(color_eyre::eyre::eyre!("generation service unavailable"));
			}

			self.responses
				.lock()
				.unwrap()
				.pop_front()
				.ok_or_else(|| color_eyre::eyre::eyre!("no scripted response left"))
		})
	}
}

pub struct Fixture {
	pub service: CompassService,
	pub records: Arc<InMemoryRecordStore>,
	pub exclusions: Arc<InMemoryExclusionStore>,
	pub embedding: Arc<StubEmbedding>,
	pub generator: Arc<SpyGenerator>,
}

pub fn fixture() -> Fixture {
	let records = Arc::new(InMemoryRecordStore::new());
	let exclusions = Arc::new(InMemoryExclusionStore::new());
	let embedding = StubEmbedding::new(vec![1.0, 0.0, 0.0, 0.0]);
	let generator = SpyGenerator::new();
	let service = CompassService::with_providers(
		test_config(),
		records.clone(),
		exclusions.clone(),
		embedding.clone(),
		generator.clone(),
	);

	Fixture { service, records, exclusions, embedding, generator }
}

pub fn segments(parts: &[&str]) -> Vec<String> {
	parts.iter().map(ToString::to_string).collect()
}

pub struct RecordSpec<'a> {
	pub path: &'a [&'a str],
	pub content: &'a str,
	pub kind: &'a str,
	pub level: Option<i32>,
	pub vector: Option<Vec<f32>>,
	pub usage_count: i64,
	pub label: Option<&'a str>,
}

pub fn seed_record(store: &InMemoryRecordStore, spec: RecordSpec<'_>) -> Uuid {
	let record_id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();

	store.seed(EmbeddingRecord {
		record_id,
		path: segments(spec.path),
		content: spec.content.to_string(),
		kind: spec.kind.to_string(),
		level: spec.level,
		vector: spec.vector,
		usage_count: spec.usage_count,
		label: spec.label.map(ToString::to_string),
		active: true,
		provenance: "seeded".to_string(),
		created_at: now,
		updated_at: now,
	});

	record_id
}
