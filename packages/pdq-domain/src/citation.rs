use serde::{Deserialize, Serialize};

use crate::chunk::BBox;

/// The exact sentence the generative step must emit when the context holds no
/// supporting evidence. Citations are always empty alongside it.
pub const NOT_FOUND_ANSWER: &str = "Not found in the project documents.";

pub const SNIPPET_MAX_CHARS: usize = 240;

/// A page-level pointer into a source document. The bbox is sourced from the
/// evidence set, never trusted verbatim from the generative step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	pub doc_id: String,
	pub page_number: u32,
	pub snippet: String,
	pub bbox: Option<BBox>,
}
impl Citation {
	pub fn clamp_snippet(&mut self) {
		self.snippet = crate::snippet::ellipsize(&self.snippet, SNIPPET_MAX_CHARS);
	}
}

/// Case-insensitive prefix check; models vary the sentence's tail.
pub fn is_not_found(answer: &str) -> bool {
	answer.trim_start().to_lowercase().starts_with("not found")
}
