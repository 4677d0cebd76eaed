//! The recommendation and canonicalization engine. Retrieval runs first, generation covers the
//! shortfall, and every external failure degrades to an empty contribution instead of an error;
//! only policy violations (retry ceiling, malformed requests) surface to the caller.

pub mod canonicalize;
pub mod fallback;
pub mod missions;
pub mod recommend;
pub mod retrieval;
pub mod select;

mod error;

pub use error::Error;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use compass_config::Config;
use compass_domain::path::display_path;
use compass_storage::{
	BoxFuture,
	store::{ExclusionStore, RecordStore},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Embedding service seam. The production implementation is one HTTP round-trip per call; tests
/// substitute scripted doubles.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Text-generation seam. Returns raw assistant text; payload contracts live with the caller.
pub trait GeneratorProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		system_instruction: &'a str,
		user_prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub struct HttpEmbeddingProvider {
	cfg: compass_config::EmbeddingProviderConfig,
}
impl HttpEmbeddingProvider {
	pub fn new(cfg: compass_config::EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}
impl EmbeddingProvider for HttpEmbeddingProvider {
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(compass_providers::embedding::embed(&self.cfg, texts))
	}
}

pub struct HttpGeneratorProvider {
	cfg: compass_config::GeneratorProviderConfig,
}
impl HttpGeneratorProvider {
	pub fn new(cfg: compass_config::GeneratorProviderConfig) -> Self {
		Self { cfg }
	}
}
impl GeneratorProvider for HttpGeneratorProvider {
	fn generate<'a>(
		&'a self,
		system_instruction: &'a str,
		user_prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(compass_providers::generator::generate(&self.cfg, system_instruction, user_prompt))
	}
}

pub struct CompassService {
	pub(crate) cfg: Config,
	pub(crate) records: Arc<dyn RecordStore>,
	pub(crate) exclusions: Arc<dyn ExclusionStore>,
	pub(crate) embedding: Arc<dyn EmbeddingProvider>,
	pub(crate) generator: Arc<dyn GeneratorProvider>,
}
impl CompassService {
	pub fn new(
		cfg: Config,
		records: Arc<dyn RecordStore>,
		exclusions: Arc<dyn ExclusionStore>,
	) -> Self {
		let embedding = Arc::new(HttpEmbeddingProvider::new(cfg.providers.embedding.clone()));
		let generator = Arc::new(HttpGeneratorProvider::new(cfg.providers.generator.clone()));

		Self::with_providers(cfg, records, exclusions, embedding, generator)
	}

	pub fn with_providers(
		cfg: Config,
		records: Arc<dyn RecordStore>,
		exclusions: Arc<dyn ExclusionStore>,
		embedding: Arc<dyn EmbeddingProvider>,
		generator: Arc<dyn GeneratorProvider>,
	) -> Self {
		Self { cfg, records, exclusions, embedding, generator }
	}
}

/// Prompt-conditioning context. Absent fields drop out of the prompt; they never error.
#[derive(Clone, Debug, Default)]
pub struct Profile {
	pub age: Option<u32>,
	pub role: Option<String>,
	pub bio: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
	Retrieved,
	Generated,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Embedding,
	Retrieval,
	Generation,
	Persistence,
}

/// A stage that contributed nothing. Recorded on the result so callers and tests can tell a
/// genuinely empty scope from a degraded pipeline.
#[derive(Clone, Debug)]
pub struct Degradation {
	pub stage: Stage,
	pub reason: String,
}

#[derive(Clone, Debug)]
pub struct Candidate {
	/// Set once the candidate is backed by a persisted record.
	pub record_id: Option<Uuid>,
	pub path: Vec<String>,
	pub content: String,
	pub difficulty: Option<i32>,
	pub source: Source,
}

#[derive(Debug, Default)]
pub struct Recommendation {
	pub candidates: Vec<Candidate>,
	pub retrieved_count: usize,
	pub generated_count: usize,
	pub degradations: Vec<Degradation>,
}

/// Embedding seed for a record: the scope qualifies the text, so identical sentences under
/// different categories may diverge.
pub(crate) fn context_text(path: &[String], content: &str) -> String {
	if path.is_empty() {
		content.to_string()
	} else {
		format!("{}: {content}", display_path(path))
	}
}
