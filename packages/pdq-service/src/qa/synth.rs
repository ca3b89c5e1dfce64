use serde_json::Value;

use pdq_domain::{BBox, Chunk, Citation, NOT_FOUND_ANSWER, is_not_found, repair, snippet};

/// Fallback snippets are shorter than citation snippets; they come straight
/// from chunk text rather than a model quote.
const FALLBACK_SNIPPET_CHARS: usize = 200;

pub const SYSTEM_PROMPT: &str = r#"You are an assistant for construction projects.
Use ONLY the CONTEXT provided. If not found, answer exactly "Not found in the project documents."

CRITICAL: Return ONLY valid JSON. No markdown. No prose before or after the JSON. No code fences.

JSON schema:
{
  "answer": "string",
  "citations": [
    {
      "doc_id": "string",
      "page_number": 123,
      "snippet": "string",
      "bbox": [x1, y1, x2, y2]
    }
  ]
}

Rules:
- Quote numeric values with units exactly as written in context.
- Do not invent information.
- Always include 1-3 citations when answer is found.
- If no evidence in context, return: {"answer":"Not found in the project documents.","citations":[]}
- Extract bbox from the context headers. Format: [1] doc_id=xxx page=N source=xxx conf=0.9 bbox=[x1,y1,x2,y2]
- Copy the bbox array exactly as shown (4 numbers). If bbox is not present, use null.
"#;

pub fn build_messages(question: &str, context: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({
			"role": "user",
			"content": format!("QUESTION: {question}\n\nCONTEXT:\n{context}\n"),
		}),
	]
}

/// The shape the generative step is asked to emit. `citations` is required;
/// its absence is treated as a parse failure.
#[derive(Debug, serde::Deserialize)]
pub struct RawAnswer {
	#[serde(default)]
	pub answer: String,
	pub citations: Vec<RawCitation>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RawCitation {
	pub doc_id: String,
	pub page_number: u32,
	#[serde(default)]
	pub snippet: String,
	pub bbox: Option<Vec<f32>>,
}

/// Strict decode first; on failure, extract the first balanced `{...}` span
/// and retry. `None` means the caller must use the conservative fallback.
pub fn parse_answer(raw: &str) -> Option<RawAnswer> {
	if let Ok(parsed) = serde_json::from_str::<RawAnswer>(raw) {
		return Some(parsed);
	}

	let object = repair::extract_json_object(raw)?;

	serde_json::from_str::<RawAnswer>(object).ok()
}

/// Applies the citation repair rules and returns the final answer/citations
/// pair. The not-found sentence always carries zero citations; a positive
/// answer never carries zero citations while evidence exists.
pub fn repair_citations(parsed: RawAnswer, evidence: &[Chunk]) -> (String, Vec<Citation>) {
	if is_not_found(&parsed.answer) {
		return (parsed.answer, Vec::new());
	}
	if parsed.citations.is_empty() {
		if parsed.answer.trim().is_empty() {
			return (parsed.answer, Vec::new());
		}

		return (parsed.answer, fallback_citations(evidence));
	}

	let citations = parsed
		.citations
		.into_iter()
		.map(|raw| {
			let model_bbox = raw.bbox.as_deref().and_then(BBox::from_slice);
			let matched = evidence
				.iter()
				.find(|chunk| chunk.doc_id == raw.doc_id && chunk.page_number == raw.page_number);
			// Overwrite only a missing or all-zero bbox; a plausible model
			// bbox passes through, and unmatched citations keep theirs.
			let bbox = match (matched, model_bbox) {
				(Some(chunk), None) => chunk.bbox,
				(Some(chunk), Some(bbox)) if bbox.is_zero() => chunk.bbox,
				(_, bbox) => bbox,
			};
			let mut citation = Citation {
				doc_id: raw.doc_id,
				page_number: raw.page_number,
				snippet: raw.snippet,
				bbox,
			};

			citation.clamp_snippet();

			citation
		})
		.collect();

	(parsed.answer, citations)
}

/// Citations synthesized from the top evidence entries, for when the model
/// output is unusable or omitted citations.
pub fn fallback_citations(evidence: &[Chunk]) -> Vec<Citation> {
	evidence
		.iter()
		.take(3)
		.map(|chunk| Citation {
			doc_id: chunk.doc_id.clone(),
			page_number: chunk.page_number,
			snippet: snippet::ellipsize(&chunk.text, FALLBACK_SNIPPET_CHARS),
			bbox: chunk.bbox,
		})
		.collect()
}

/// The conservative last resort when parsing fails outright.
pub fn conservative_fallback(evidence: &[Chunk]) -> (String, Vec<Citation>) {
	if evidence.is_empty() {
		(NOT_FOUND_ANSWER.to_string(), Vec::new())
	} else {
		("See cited excerpts.".to_string(), fallback_citations(evidence))
	}
}

#[cfg(test)]
mod tests {
	use pdq_domain::Source;

	use super::*;

	fn evidence() -> Vec<Chunk> {
		vec![Chunk {
			chunk_id: "c1".to_string(),
			doc_id: "doc_1".to_string(),
			project_id: "proj_1".to_string(),
			page_number: 4,
			section: None,
			text: "Foundation wall inspection required.".to_string(),
			bbox: Some(BBox::new(10.0, 20.0, 100.0, 200.0)),
			source: Source::Text,
			confidence: Some(0.9),
		}]
	}

	#[test]
	fn prose_around_the_object_is_repaired() {
		let raw = "Here you go:\n{\"answer\": \"42 inches\", \"citations\": []}\nHope that helps!";
		let parsed = parse_answer(raw).expect("parse failed");
		assert_eq!(parsed.answer, "42 inches");
	}

	#[test]
	fn missing_citations_field_fails_parsing() {
		assert!(parse_answer("{\"answer\": \"42 inches\"}").is_none());
		assert!(parse_answer("not json at all").is_none());
	}

	#[test]
	fn zero_bbox_is_overwritten_from_evidence() {
		let parsed = RawAnswer {
			answer: "Inspection is required.".to_string(),
			citations: vec![RawCitation {
				doc_id: "doc_1".to_string(),
				page_number: 4,
				snippet: "Foundation wall inspection required.".to_string(),
				bbox: Some(vec![0.0, 0.0, 0.0, 0.0]),
			}],
		};
		let (_, citations) = repair_citations(parsed, &evidence());
		assert_eq!(citations[0].bbox, Some(BBox::new(10.0, 20.0, 100.0, 200.0)));
	}

	#[test]
	fn plausible_model_bbox_passes_through() {
		let parsed = RawAnswer {
			answer: "Inspection is required.".to_string(),
			citations: vec![RawCitation {
				doc_id: "doc_1".to_string(),
				page_number: 4,
				snippet: String::new(),
				bbox: Some(vec![1.0, 2.0, 3.0, 4.0]),
			}],
		};
		let (_, citations) = repair_citations(parsed, &evidence());
		assert_eq!(citations[0].bbox, Some(BBox::new(1.0, 2.0, 3.0, 4.0)));
	}

	#[test]
	fn not_found_forces_empty_citations() {
		let parsed = RawAnswer {
			answer: NOT_FOUND_ANSWER.to_string(),
			citations: vec![RawCitation {
				doc_id: "doc_1".to_string(),
				page_number: 4,
				snippet: "stray".to_string(),
				bbox: None,
			}],
		};
		let (answer, citations) = repair_citations(parsed, &evidence());
		assert_eq!(answer, NOT_FOUND_ANSWER);
		assert!(citations.is_empty());
	}

	#[test]
	fn positive_answer_without_citations_gets_evidence_citations() {
		let parsed =
			RawAnswer { answer: "Inspection is required.".to_string(), citations: Vec::new() };
		let (_, citations) = repair_citations(parsed, &evidence());
		assert_eq!(citations.len(), 1);
		assert_eq!(citations[0].doc_id, "doc_1");
	}

	#[test]
	fn long_snippets_are_clamped() {
		let parsed = RawAnswer {
			answer: "Long quote.".to_string(),
			citations: vec![RawCitation {
				doc_id: "doc_1".to_string(),
				page_number: 4,
				snippet: "y".repeat(400),
				bbox: None,
			}],
		};
		let (_, citations) = repair_citations(parsed, &evidence());
		assert!(citations[0].snippet.chars().count() <= 241);
	}

	#[test]
	fn empty_evidence_falls_back_to_not_found() {
		let (answer, citations) = conservative_fallback(&[]);
		assert_eq!(answer, NOT_FOUND_ANSWER);
		assert!(citations.is_empty());
	}
}
