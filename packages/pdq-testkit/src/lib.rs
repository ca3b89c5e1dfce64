//! Scripted collaborator fakes and engine-shaped response builders so
//! pipeline tests run hermetically, with no search engine, database, or
//! provider network access.

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use color_eyre::eyre;
use serde_json::Value;

use pdq_config::{
	Config, ContextBudget, EmbeddingProviderConfig, LlmProviderConfig, Postgres, ProviderConfig,
	Providers as ProviderSection, Retrieval, Router, SearchEngine, Service, Storage, Suggestions,
};
use pdq_service::{
	BoxFuture, ChatDeltas, ChatProvider, EmbeddingProvider, RerankProvider, SearchBackend,
	TocRange, TocStore,
};

/// A complete configuration with local placeholder endpoints. Tests mutate
/// the sections they care about.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: "postgres://localhost/pdq_test".to_string(), pool_max_conns: 2 },
			search: SearchEngine {
				url: "http://localhost:9200".to_string(),
				chunk_index: "chunks_test".to_string(),
				table_index: "tables_test".to_string(),
				username: None,
				password: None,
				timeout_ms: 1_000,
			},
		},
		providers: ProviderSection {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			chat: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "test-chat".to_string(),
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		retrieval: Retrieval::default(),
		context: ContextBudget::default(),
		router: Router::default(),
		suggestions: Suggestions::default(),
	}
}

/// Embedding fake returning the same vector for every input text.
pub struct FixedEmbedding(pub Vec<f32>);
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|_| self.0.clone()).collect()) })
	}
}

pub struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		_: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async { Err(eyre::eyre!("Embedding provider is down.")) })
	}
}

/// Rerank fake returning a fixed ordering regardless of input.
pub struct ScriptedRerank(pub Vec<usize>);
impl RerankProvider for ScriptedRerank {
	fn rerank<'a>(
		&'a self,
		_: &'a ProviderConfig,
		_: &'a str,
		_: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<usize>>> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

pub struct FailingRerank;
impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_: &'a ProviderConfig,
		_: &'a str,
		_: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<usize>>> {
		Box::pin(async { Err(eyre::eyre!("Rerank provider is down.")) })
	}
}

/// Chat fake with queued single-shot completions and queued delta scripts.
/// Each call pops the next queued response; an empty queue is an error.
#[derive(Default)]
pub struct ScriptedChat {
	completions: Mutex<VecDeque<String>>,
	delta_scripts: Mutex<VecDeque<Vec<String>>>,
}
impl ScriptedChat {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn queue_completion(&self, raw: impl Into<String>) {
		self.completions.lock().unwrap_or_else(|err| err.into_inner()).push_back(raw.into());
	}

	pub fn queue_deltas(&self, deltas: &[&str]) {
		self.delta_scripts
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push_back(deltas.iter().map(|s| s.to_string()).collect());
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_: &'a LlmProviderConfig,
		_: &'a [Value],
		_: f32,
		_: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			self.completions
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.pop_front()
				.ok_or_else(|| eyre::eyre!("No scripted completion left."))
		})
	}

	fn stream<'a>(
		&'a self,
		_: &'a LlmProviderConfig,
		_: &'a [Value],
		_: f32,
		_: u32,
	) -> BoxFuture<'a, color_eyre::Result<Box<dyn ChatDeltas>>> {
		Box::pin(async move {
			let deltas = self
				.delta_scripts
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.pop_front()
				.ok_or_else(|| eyre::eyre!("No scripted delta stream left."))?;

			Ok(Box::new(ScriptedDeltas { deltas: deltas.into() }) as Box<dyn ChatDeltas>)
		})
	}
}

pub struct ScriptedDeltas {
	deltas: VecDeque<String>,
}
impl ChatDeltas for ScriptedDeltas {
	fn next_delta(&mut self) -> BoxFuture<'_, color_eyre::Result<Option<String>>> {
		Box::pin(async move { Ok(self.deltas.pop_front()) })
	}
}

type SearchFn = dyn Fn(&str, &Value) -> color_eyre::Result<Value> + Send + Sync;

/// Search backend fake driven by a closure over `(index, body)`.
pub struct FnSearchBackend(Arc<SearchFn>);
impl FnSearchBackend {
	pub fn new(f: impl Fn(&str, &Value) -> color_eyre::Result<Value> + Send + Sync + 'static) -> Self {
		Self(Arc::new(f))
	}
}
impl SearchBackend for FnSearchBackend {
	fn search<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(async move { (self.0)(index, body) })
	}
}

pub struct StaticToc(pub Vec<TocRange>);
impl TocStore for StaticToc {
	fn ranges<'a>(
		&'a self,
		_: &'a str,
		_: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TocRange>>> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

pub struct FailingToc;
impl TocStore for FailingToc {
	fn ranges<'a>(
		&'a self,
		_: &'a str,
		_: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TocRange>>> {
		Box::pin(async { Err(eyre::eyre!("TOC store is down.")) })
	}
}

/// An engine `_search` response with the given `(source, score)` hits.
pub fn hits_response(hits: &[(Value, f32)]) -> Value {
	let hits: Vec<Value> = hits
		.iter()
		.map(|(source, score)| serde_json::json!({ "_source": source, "_score": score }))
		.collect();

	serde_json::json!({ "hits": { "hits": hits } })
}

pub fn empty_response() -> Value {
	serde_json::json!({ "hits": { "hits": [] } })
}

/// A chunk `_source` document as the indexer writes it.
pub fn chunk_source(chunk_id: &str, doc_id: &str, page_number: u32, text: &str) -> Value {
	serde_json::json!({
		"chunk_id": chunk_id,
		"doc_id": doc_id,
		"project_id": "proj_1",
		"page_number": page_number,
		"section": null,
		"text": text,
		"bbox": [10.0, 20.0, 100.0, 200.0],
		"source": "text",
		"confidence": 0.9,
	})
}

/// A table-row `_source` document.
pub fn table_source(row_id: &str, doc_id: &str, page_number: u32, table_text: &str) -> Value {
	serde_json::json!({
		"row_id": row_id,
		"doc_id": doc_id,
		"project_id": "proj_1",
		"page_number": page_number,
		"table_label": "Schedule",
		"table_text": table_text,
		"labels": [],
		"bbox": [5.0, 5.0, 50.0, 60.0],
	})
}
