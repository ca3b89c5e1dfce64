pub mod jobs;
pub mod qa;
pub mod router;
pub mod search;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use tokenizers::Tokenizer;

use pdq_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use pdq_providers::{chat, embedding, rerank};
use pdq_storage::{db::Db, search::SearchStore};
pub use jobs::{InMemoryJobStore, JobState, JobStore};
pub use qa::{QaEvent, QaRequest, QaResult, Suggestion};
pub use router::TocRange;
pub use search::{ChunkHit, FilterValue, MatchOrigin, SearchFilters, SearchRequest};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	/// Returns candidate indices in relevance order; the result must be a
	/// permutation of `0..docs.len()`.
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<usize>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>>;

	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<Box<dyn ChatDeltas>>>;
}

/// Pull-based reader over a streamed completion. `None` marks the end of the
/// stream.
pub trait ChatDeltas
where
	Self: Send,
{
	fn next_delta(&mut self) -> BoxFuture<'_, color_eyre::Result<Option<String>>>;
}

pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait TocStore
where
	Self: Send + Sync,
{
	fn ranges<'a>(
		&'a self,
		project_id: &'a str,
		doc_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TocRange>>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Provider { message: String },
	Search { message: String },
	Storage { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub chat: Arc<dyn ChatProvider>,
}

/// The retrieval-and-citation engine. Configuration is fixed at construction;
/// nothing here mutates after startup, so one instance serves concurrent
/// requests without locks.
pub struct PdqService {
	pub cfg: Config,
	pub search: Arc<dyn SearchBackend>,
	pub toc: Arc<dyn TocStore>,
	pub providers: Providers,
	pub jobs: Arc<dyn JobStore>,
	pub tokenizer: Option<Tokenizer>,
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Search { message } => write!(f, "Search error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<pdq_storage::Error> for ServiceError {
	fn from(err: pdq_storage::Error) -> Self {
		match err {
			pdq_storage::Error::Sqlx(err) => Self::Storage { message: err.to_string() },
			err => Self::Search { message: err.to_string() },
		}
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<usize>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(chat::complete(cfg, messages, temperature, max_tokens))
	}

	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<Box<dyn ChatDeltas>>> {
		Box::pin(async move {
			let stream = chat::stream(cfg, messages, temperature, max_tokens).await?;

			Ok(Box::new(stream) as Box<dyn ChatDeltas>)
		})
	}
}

impl ChatDeltas for chat::ChatStream {
	fn next_delta(&mut self) -> BoxFuture<'_, color_eyre::Result<Option<String>>> {
		Box::pin(self.next_delta())
	}
}

impl SearchBackend for SearchStore {
	fn search<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(async move { Ok(self.search(index, body).await?) })
	}
}

impl TocStore for Db {
	fn ranges<'a>(
		&'a self,
		project_id: &'a str,
		doc_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TocRange>>> {
		Box::pin(async move {
			let entries = pdq_storage::toc::lookup(&self.pool, project_id, doc_id).await?;

			Ok(entries.into_iter().map(TocRange::from_entry).collect())
		})
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		chat: Arc<dyn ChatProvider>,
	) -> Self {
		Self { embedding, rerank, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), rerank: provider.clone(), chat: provider }
	}
}

impl PdqService {
	pub fn new(cfg: Config, search: SearchStore, db: Db) -> Self {
		let tokenizer = load_tokenizer(&cfg);

		Self {
			cfg,
			search: Arc::new(search),
			toc: Arc::new(db),
			providers: Providers::default(),
			jobs: Arc::new(InMemoryJobStore::new()),
			tokenizer,
		}
	}

	pub fn with_parts(
		cfg: Config,
		search: Arc<dyn SearchBackend>,
		toc: Arc<dyn TocStore>,
		providers: Providers,
		jobs: Arc<dyn JobStore>,
		tokenizer: Option<Tokenizer>,
	) -> Self {
		Self { cfg, search, toc, providers, jobs, tokenizer }
	}

	/// Current state of a tracked job. Unrecognized ids are [`JobState::Unknown`].
	pub fn job_status(&self, job_id: uuid::Uuid) -> JobState {
		self.jobs.status(job_id)
	}
}

fn load_tokenizer(cfg: &Config) -> Option<Tokenizer> {
	let repo = cfg.context.tokenizer_repo.as_deref()?;

	match Tokenizer::from_pretrained(repo, None) {
		Ok(tokenizer) => Some(tokenizer),
		Err(err) => {
			// Token budgeting falls back to the chars-per-token heuristic.
			tracing::warn!(repo, %err, "Tokenizer load failed.");

			None
		},
	}
}
