use std::collections::HashSet;

use tokenizers::Tokenizer;

use pdq_config::ContextBudget;
use pdq_domain::{Chunk, snippet};

use crate::{PdqService, search::ChunkHit};

/// Token accounting for the context budget. Exact counts when a tokenizer is
/// loaded, a chars-per-token heuristic otherwise.
pub enum TokenCounter<'a> {
	Exact(&'a Tokenizer),
	Heuristic { chars_per_token: f32 },
}
impl TokenCounter<'_> {
	pub fn count(&self, text: &str) -> usize {
		match self {
			Self::Exact(tokenizer) => match tokenizer.encode(text, false) {
				Ok(encoding) => encoding.get_ids().len(),
				Err(_) => heuristic_count(text, 4.0),
			},
			Self::Heuristic { chars_per_token } => heuristic_count(text, *chars_per_token),
		}
	}
}

fn heuristic_count(text: &str, chars_per_token: f32) -> usize {
	(text.chars().count() as f32 / chars_per_token).ceil() as usize
}

/// Deduplicates by chunk id, then keeps the first chunk per
/// `(doc_id, page_number)` so one page cannot flood the context.
pub fn dedupe_for_context(hits: &[ChunkHit], max_items: usize) -> Vec<Chunk> {
	let mut seen_chunks = HashSet::new();
	let mut seen_pages = HashSet::new();
	let mut out = Vec::new();

	for hit in hits {
		if !seen_chunks.insert(hit.chunk.chunk_id.clone()) {
			continue;
		}
		if !seen_pages.insert((hit.chunk.doc_id.clone(), hit.chunk.page_number)) {
			continue;
		}

		out.push(hit.chunk.clone());

		if out.len() >= max_items {
			break;
		}
	}

	out
}

/// The fixed header the generative step reads bboxes from. Format changes
/// here must track the system prompt.
pub fn header_line(index: usize, chunk: &Chunk) -> String {
	let conf = match chunk.confidence {
		Some(conf) => conf.to_string(),
		None => "n/a".to_string(),
	};
	let bbox = match &chunk.bbox {
		Some(bbox) => {
			format!(" bbox=[{:.1},{:.1},{:.1},{:.1}]", bbox.x0, bbox.y0, bbox.x1, bbox.y1)
		},
		None => String::new(),
	};

	format!(
		"[{index}] doc_id={} page={} source={} conf={conf}{bbox}\n",
		chunk.doc_id,
		chunk.page_number,
		chunk.source.as_str()
	)
}

/// Renders candidates into the generation context under the token budget.
/// Returns the context string and the evidence set: exactly the chunks whose
/// text appears in the context, used later for citation repair.
pub fn build_context(
	candidates: Vec<Chunk>,
	budget: &ContextBudget,
	counter: &TokenCounter<'_>,
) -> (String, Vec<Chunk>) {
	let available = budget.max_tokens.saturating_sub(budget.reserved_tokens) as usize;
	let mut sections: Vec<String> = Vec::new();
	let mut selected = Vec::new();
	let mut used = 0_usize;

	for (i, chunk) in candidates.into_iter().enumerate() {
		let header = header_line(i + 1, &chunk);
		let header_tokens = counter.count(&header);
		let text_tokens = counter.count(&chunk.text);

		// +2 for the blank-line separator between sections.
		if used + header_tokens + text_tokens + 2 <= available {
			sections.push(format!("{header}{}", chunk.text));
			used += header_tokens + text_tokens + 2;
			selected.push(chunk);
		} else if used + header_tokens + 100 <= available {
			let remaining = available - used - header_tokens - 2;
			let chars_per_token = if text_tokens > 0 {
				chunk.text.chars().count() as f32 / text_tokens as f32
			} else {
				4.0
			};
			let estimated_chars = (remaining as f32 * chars_per_token) as usize;
			let mut trimmed = snippet::trim_to_sentence_boundary(&chunk.text, estimated_chars);
			let mut trimmed_tokens = counter.count(&trimmed);

			// The estimate can overshoot; shrink until the partial fits.
			while trimmed_tokens > remaining && trimmed.chars().count() > 100 {
				let shorter = trimmed.chars().count() - 100;

				trimmed = snippet::trim_to_sentence_boundary(&trimmed, shorter);
				trimmed_tokens = counter.count(&trimmed);
			}

			if trimmed_tokens >= budget.min_partial_tokens as usize {
				sections.push(format!("{header}{trimmed}"));
				selected.push(chunk);
			}

			break;
		} else {
			break;
		}
	}

	(sections.join("\n\n"), selected)
}

impl PdqService {
	pub(crate) fn token_counter(&self) -> TokenCounter<'_> {
		match &self.tokenizer {
			Some(tokenizer) => TokenCounter::Exact(tokenizer),
			None => TokenCounter::Heuristic { chars_per_token: self.cfg.context.chars_per_token },
		}
	}
}

#[cfg(test)]
mod tests {
	use pdq_domain::{BBox, Source};

	use crate::search::MatchOrigin;

	use super::*;

	fn chunk(id: &str, doc: &str, page: u32, text: &str) -> Chunk {
		Chunk {
			chunk_id: id.to_string(),
			doc_id: doc.to_string(),
			project_id: "proj_1".to_string(),
			page_number: page,
			section: None,
			text: text.to_string(),
			bbox: Some(BBox::new(10.0, 20.0, 100.0, 200.0)),
			source: Source::Text,
			confidence: Some(0.9),
		}
	}

	fn hit(id: &str, doc: &str, page: u32) -> ChunkHit {
		ChunkHit { chunk: chunk(id, doc, page, "text"), score: 1.0, matched: MatchOrigin::Bm25 }
	}

	#[test]
	fn context_never_holds_two_chunks_from_one_page() {
		let deduped = dedupe_for_context(
			&[hit("a", "doc_1", 4), hit("b", "doc_1", 4), hit("c", "doc_1", 5)],
			15,
		);
		assert_eq!(deduped.len(), 2);
		assert_eq!(deduped[0].chunk_id, "a");
		assert_eq!(deduped[1].chunk_id, "c");
	}

	#[test]
	fn duplicate_chunk_ids_are_dropped() {
		let deduped = dedupe_for_context(&[hit("a", "doc_1", 4), hit("a", "doc_1", 9)], 15);
		assert_eq!(deduped.len(), 1);
	}

	#[test]
	fn header_renders_bbox_to_one_decimal() {
		let header = header_line(1, &chunk("a", "doc_1", 4, "text"));
		assert_eq!(header, "[1] doc_id=doc_1 page=4 source=text conf=0.9 bbox=[10.0,20.0,100.0,200.0]\n");
	}

	#[test]
	fn header_marks_missing_confidence() {
		let mut chunk = chunk("a", "doc_1", 4, "text");
		chunk.confidence = None;
		chunk.bbox = None;
		assert_eq!(header_line(2, &chunk), "[2] doc_id=doc_1 page=4 source=text conf=n/a\n");
	}

	#[test]
	fn budget_cuts_off_with_at_most_one_partial_chunk() {
		let budget = ContextBudget {
			max_tokens: 600,
			reserved_tokens: 100,
			..ContextBudget::default()
		};
		let counter = TokenCounter::Heuristic { chars_per_token: 4.0 };
		// Each chunk costs roughly 110 tokens with its header; budget is 500.
		let sentence = "This sentence is about forty characters. ".repeat(10);
		let candidates: Vec<Chunk> =
			(0..20).map(|i| chunk(&format!("c{i}"), "doc_1", i, &sentence)).collect();
		let (context, selected) = build_context(candidates, &budget, &counter);

		assert!(selected.len() < 20);
		assert!(counter.count(&context) <= 500);
	}

	#[test]
	fn evidence_set_matches_rendered_sections() {
		let budget = ContextBudget::default();
		let counter = TokenCounter::Heuristic { chars_per_token: 4.0 };
		let candidates = vec![chunk("a", "doc_1", 4, "Foundation wall inspection required.")];
		let (context, selected) = build_context(candidates, &budget, &counter);

		assert_eq!(selected.len(), 1);
		assert!(context.contains("Foundation wall inspection required."));
		assert!(context.starts_with("[1] doc_id=doc_1 page=4"));
	}

	#[test]
	fn zero_candidates_yield_empty_context_and_evidence() {
		let (context, selected) = build_context(
			Vec::new(),
			&ContextBudget::default(),
			&TokenCounter::Heuristic { chars_per_token: 4.0 },
		);
		assert!(context.is_empty());
		assert!(selected.is_empty());
	}
}
