mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, ContextBudget, EmbeddingProviderConfig, LlmProviderConfig, Postgres, ProviderConfig,
	Providers, Retrieval, Router, SearchEngine, Service, Storage, Suggestions,
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
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.search.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.search.url must be non-empty.".to_string(),
		});
	}
	for (label, index) in [
		("chunk_index", &cfg.storage.search.chunk_index),
		("table_index", &cfg.storage.search.table_index),
	] {
		if index.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("storage.search.{label} must be non-empty."),
			});
		}
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	// The rerank key may be empty: the reranker degrades to identity order without it.
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("chat", &cfg.providers.chat.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	if cfg.retrieval.size == 0 {
		return Err(Error::Validation {
			message: "retrieval.size must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.num_candidates < cfg.retrieval.size {
		return Err(Error::Validation {
			message: "retrieval.num_candidates must be at least retrieval.size.".to_string(),
		});
	}
	if cfg.retrieval.rerank_top_n == 0 {
		return Err(Error::Validation {
			message: "retrieval.rerank_top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.context.max_tokens <= cfg.context.reserved_tokens {
		return Err(Error::Validation {
			message: "context.max_tokens must exceed context.reserved_tokens.".to_string(),
		});
	}
	if cfg.context.max_chunks == 0 {
		return Err(Error::Validation {
			message: "context.max_chunks must be greater than zero.".to_string(),
		});
	}
	if !cfg.context.chars_per_token.is_finite() || cfg.context.chars_per_token <= 0.0 {
		return Err(Error::Validation {
			message: "context.chars_per_token must be a positive finite number.".to_string(),
		});
	}
	if !cfg.router.boost_weight.is_finite() || cfg.router.boost_weight < 0.0 {
		return Err(Error::Validation {
			message: "router.boost_weight must be zero or greater.".to_string(),
		});
	}
	if cfg.suggestions.enabled && cfg.suggestions.max_candidates == 0 {
		return Err(Error::Validation {
			message: "suggestions.max_candidates must be greater than zero when enabled."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	while cfg.storage.search.url.ends_with('/') {
		cfg.storage.search.url.pop();
	}
	if cfg
		.storage
		.search
		.username
		.as_deref()
		.map(|name| name.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.storage.search.username = None;
	}
	if cfg
		.storage
		.search
		.password
		.as_deref()
		.map(|password| password.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.storage.search.password = None;
	}
	if cfg.context.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.context.tokenizer_repo = None;
	}
}
