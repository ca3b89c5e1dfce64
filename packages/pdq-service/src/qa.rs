pub mod answer;
pub mod context;
pub mod stream;
pub mod suggest;
pub mod synth;

use pdq_domain::Citation;

use crate::search::SearchFilters;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QaRequest {
	pub question: String,
	pub filters: SearchFilters,
	pub size: Option<u32>,
}

/// An alternative phrasing that was actually tested against the evidence-only
/// pipeline and produced citations. The cached fields let a caller show the
/// result without re-running the query.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Suggestion {
	pub query: String,
	pub preview: String,
	pub citation_count: u32,
	pub cached_answer: String,
	pub cached_citations: Vec<Citation>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QaResult {
	pub answer: String,
	pub citations: Vec<Citation>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub suggestions: Option<Vec<Suggestion>>,
}

/// Events emitted by the streaming QA variant, in order: zero or more
/// `status`/`chunk` events, then exactly one `done` or `error`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QaEvent {
	Status { message: String },
	Chunk { content: String },
	Done { answer: String, citations: Vec<Citation>, suggestions: Vec<Suggestion> },
	Error { message: String },
}
