mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Canonicalize, Config, EmbeddingProviderConfig, Exclusion, GeneratorProviderConfig, Postgres,
	Providers, Recommend, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generator", &cfg.providers.generator.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	for (label, timeout) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.generator.timeout_ms", cfg.providers.generator.timeout_ms),
	] {
		if timeout == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	for (label, score) in [
		("retrieval.category_min_score", cfg.retrieval.category_min_score),
		("retrieval.mission_min_score", cfg.retrieval.mission_min_score),
	] {
		if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number in the range -1.0-1.0."),
			});
		}
	}

	if cfg.retrieval.candidate_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be greater than zero.".to_string(),
		});
	}

	for (label, weight) in [
		("retrieval.similarity_weight", cfg.retrieval.similarity_weight),
		("retrieval.usage_weight", cfg.retrieval.usage_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number of zero or greater."),
			});
		}
	}

	let weight_sum = cfg.retrieval.similarity_weight + cfg.retrieval.usage_weight;

	if (weight_sum - 1.0).abs() > 1e-3 {
		return Err(Error::Validation {
			message: "retrieval.similarity_weight and retrieval.usage_weight must sum to 1.0."
				.to_string(),
		});
	}

	if !cfg.recommend.rag_ratio.is_finite() || !(0.0..=1.0).contains(&cfg.recommend.rag_ratio) {
		return Err(Error::Validation {
			message: "recommend.rag_ratio must be a finite number in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.recommend.max_count == 0 {
		return Err(Error::Validation {
			message: "recommend.max_count must be greater than zero.".to_string(),
		});
	}
	if cfg.recommend.today_count == 0 || cfg.recommend.today_count > cfg.recommend.max_count {
		return Err(Error::Validation {
			message: "recommend.today_count must be between one and recommend.max_count."
				.to_string(),
		});
	}
	if cfg.recommend.retry_ceiling == 0 {
		return Err(Error::Validation {
			message: "recommend.retry_ceiling must be greater than zero.".to_string(),
		});
	}
	if !cfg.canonicalize.max_distance.is_finite()
		|| !(0.0..=2.0).contains(&cfg.canonicalize.max_distance)
	{
		return Err(Error::Validation {
			message: "canonicalize.max_distance must be a finite number in the range 0.0-2.0."
				.to_string(),
		});
	}
	if cfg.canonicalize.max_label_chars == 0 {
		return Err(Error::Validation {
			message: "canonicalize.max_label_chars must be greater than zero.".to_string(),
		});
	}
	if !(-12..=14).contains(&cfg.exclusion.utc_offset_hours) {
		return Err(Error::Validation {
			message: "exclusion.utc_offset_hours must be in the range -12-14.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
