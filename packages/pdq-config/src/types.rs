use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub context: ContextBudget,
	#[serde(default)]
	pub router: Router,
	#[serde(default)]
	pub suggestions: Suggestions,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub search: SearchEngine,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// OpenSearch-compatible engine holding the chunk and table-row indices.
#[derive(Debug, Deserialize)]
pub struct SearchEngine {
	pub url: String,
	pub chunk_index: String,
	pub table_index: String,
	pub username: Option<String>,
	pub password: Option<String>,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub chat: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
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

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Per-branch result cap before merging.
	pub size: u32,
	pub num_candidates: u32,
	pub table_size: u32,
	/// Candidates kept after reranking.
	pub rerank_top_n: u32,
	/// Hard cap on the brute-force cosine fallback fetch.
	pub fallback_fetch_cap: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			size: 64,
			num_candidates: 200,
			table_size: 20,
			rerank_top_n: 15,
			fallback_fetch_cap: 500,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
	pub max_tokens: u32,
	/// Headroom for the system prompt and user message wrapper.
	pub reserved_tokens: u32,
	pub max_chunks: u32,
	/// A partial chunk below this token count is not worth including.
	pub min_partial_tokens: u32,
	/// Used when no tokenizer is configured.
	pub chars_per_token: f32,
	pub tokenizer_repo: Option<String>,
}
impl Default for ContextBudget {
	fn default() -> Self {
		Self {
			max_tokens: 8_000,
			reserved_tokens: 500,
			max_chunks: 15,
			min_partial_tokens: 50,
			chars_per_token: 4.0,
			tokenizer_repo: None,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Router {
	pub boost_weight: f32,
}
impl Default for Router {
	fn default() -> Self {
		Self { boost_weight: 3.5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Suggestions {
	pub enabled: bool,
	pub max_candidates: u32,
	pub preview_chars: u32,
}
impl Default for Suggestions {
	fn default() -> Self {
		Self { enabled: true, max_candidates: 3, preview_chars: 150 }
	}
}
