use tracing::warn;

use pdq_domain::snippet;

use crate::{
	PdqService,
	qa::{QaRequest, Suggestion},
	search::SearchFilters,
};

const REPHRASE_TEMPERATURE: f32 = 0.5;
const REPHRASE_MAX_TOKENS: u32 = 200;

const REPHRASE_PROMPT: &str = r#"You are a construction document search assistant.
A user's query returned no results. Generate 2-3 alternative ways to ask the same question that might find results.

Focus on:
- Using synonyms (e.g., "drawings" instead of "diagrams", "plans" instead of "blueprints")
- Simplifying complex queries
- Using common construction terminology
- Being more specific or more general as appropriate

Return ONLY a JSON object with "suggestions" array. Each suggestion should be a complete, natural question.

Examples:

User Query: "Show me the architectural diagrams"
Output:
{"suggestions": ["Show me the architectural drawings", "Where are the architectural plans?", "What pages have the building drawings?"]}

User Query: "What is the window to wall ratio?"
Output:
{"suggestions": ["What is the ratio of windows to wall area?", "What percentage is windows and glass?", "What is the W, S & G percentage?"]}

User Query: "Tell me about the foundation specifications"
Output:
{"suggestions": ["What are the foundation requirements?", "What is specified for the foundation?", "Show me foundation details"]}

Now generate suggestions for this query:
User Query: "{query}"
Output:"#;

impl PdqService {
	/// Proposes alternative phrasings and tests each one sequentially through
	/// the evidence-only pipeline, keeping only phrasings that produce
	/// citations. Informational only; the caller decides whether to re-run.
	pub(crate) async fn find_working_suggestions(
		&self,
		question: &str,
		filters: &SearchFilters,
	) -> Vec<Suggestion> {
		let candidates = self.propose_rephrasings(question).await;
		let mut working = Vec::new();

		for candidate in candidates {
			let req = QaRequest {
				question: candidate.clone(),
				filters: filters.clone(),
				size: None,
			};
			let result = match self.answer_evidence_only(&req).await {
				Ok(result) => result,
				Err(err) => {
					warn!(%err, query = %candidate, "Suggestion test failed.");

					continue;
				},
			};

			if result.citations.is_empty() {
				continue;
			}

			working.push(Suggestion {
				query: candidate,
				preview: snippet::ellipsize(
					&result.answer,
					self.cfg.suggestions.preview_chars as usize,
				),
				citation_count: result.citations.len() as u32,
				cached_answer: result.answer,
				cached_citations: result.citations,
			});
		}

		working
	}

	async fn propose_rephrasings(&self, question: &str) -> Vec<String> {
		let prompt = REPHRASE_PROMPT.replace("{query}", question);
		let messages = vec![serde_json::json!({ "role": "user", "content": prompt })];
		let raw = match self
			.providers
			.chat
			.complete(&self.cfg.providers.chat, &messages, REPHRASE_TEMPERATURE, REPHRASE_MAX_TOKENS)
			.await
		{
			Ok(raw) => raw,
			Err(err) => {
				warn!(%err, "Rephrasing generation failed.");

				return Vec::new();
			},
		};

		parse_suggestions(&raw, self.cfg.suggestions.max_candidates as usize)
	}
}

pub(crate) fn parse_suggestions(raw: &str, max: usize) -> Vec<String> {
	let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) else {
		return Vec::new();
	};
	let Some(suggestions) = json.get("suggestions").and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	suggestions
		.iter()
		.filter_map(|v| v.as_str())
		.filter(|s| !s.trim().is_empty())
		.take(max)
		.map(str::to_string)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn takes_at_most_max_string_suggestions() {
		let raw = r#"{"suggestions": ["a", "b", "c", "d"]}"#;
		assert_eq!(parse_suggestions(raw, 3), vec!["a", "b", "c"]);
	}

	#[test]
	fn malformed_output_yields_no_suggestions() {
		assert!(parse_suggestions("not json", 3).is_empty());
		assert!(parse_suggestions(r#"{"suggestions": "oops"}"#, 3).is_empty());
		assert!(parse_suggestions(r#"{"suggestions": [42, ""]}"#, 3).is_empty());
	}
}
