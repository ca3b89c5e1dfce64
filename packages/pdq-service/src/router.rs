use serde_json::Value;
use tracing::{debug, warn};

use crate::{
	PdqService,
	search::{FilterValue, SearchFilters},
};

/// Discipline trigger vocabularies. A query that mentions none of these
/// words skips TOC routing entirely, so the common case costs no database
/// round trip.
const TRIGGERS: &[(&str, &[&str])] = &[
	("architectural", &["architectural", "drawing", "floor plan", "plan", "architecture"]),
	("site", &["site plan", "site", "lot plan"]),
	("civil", &["civil", "grading", "lot grading"]),
	("mechanical", &["mechanical", "hvac", "ventilation", "heating", "cooling"]),
	("electrical", &["electrical", "electric", "power", "wiring"]),
	("plumbing", &["plumbing", "plumb", "piping", "water"]),
	("spec", &["spec", "specification", "sb-12", "support doc", "supporting"]),
	("permit", &["permit", "application"]),
	("inspection", &["inspection", "inspect"]),
	("structural", &["structural", "structure", "framing", "foundation"]),
];

/// An inclusive page span taken from a document's table of contents.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TocRange {
	pub doc_id: String,
	pub title: String,
	pub page_start: u32,
	pub page_end: u32,
}
impl TocRange {
	pub fn from_entry(entry: pdq_storage::toc::TocEntry) -> Self {
		Self {
			doc_id: entry.doc_id,
			title: entry.title,
			page_start: entry.page_start.max(0) as u32,
			page_end: entry.page_end.max(0) as u32,
		}
	}
}

impl PdqService {
	/// Scoring-only boost clauses for TOC spans matching the query's
	/// discipline vocabulary. Any failure degrades to no boost.
	pub(crate) async fn toc_boost(&self, query: &str, filters: &SearchFilters) -> Vec<Value> {
		if !has_trigger(query) {
			return Vec::new();
		}

		let doc_id = match &filters.doc_id {
			Some(FilterValue::One(doc_id)) => Some(doc_id.as_str()),
			_ => None,
		};
		let entries = match self.toc.ranges(&filters.project_id, doc_id).await {
			Ok(entries) => entries,
			Err(err) => {
				warn!(%err, "TOC lookup failed; searching without boosts.");

				return Vec::new();
			},
		};
		let matched = filter_toc_entries(query, entries);

		debug!(spans = matched.len(), "TOC routing matched page spans.");

		boost_clauses(&matched, self.cfg.router.boost_weight)
	}
}

pub fn has_trigger(query: &str) -> bool {
	let query = query.to_lowercase();

	TRIGGERS.iter().any(|(_, words)| words.iter().any(|word| query.contains(word)))
}

/// Keeps the spans whose title shares a trigger word with the query. The
/// shared word may come from any trigger group, not only the one that fired.
pub fn filter_toc_entries(query: &str, entries: Vec<TocRange>) -> Vec<TocRange> {
	let query = query.to_lowercase();

	entries
		.into_iter()
		.filter(|entry| {
			let title = entry.title.to_lowercase();

			TRIGGERS.iter().any(|(_, words)| {
				words.iter().any(|word| query.contains(word) && title.contains(word))
			})
		})
		.collect()
}

/// Constant-score clauses so boosted spans reorder results without ever
/// excluding anything.
pub fn boost_clauses(ranges: &[TocRange], boost: f32) -> Vec<Value> {
	ranges
		.iter()
		.map(|range| {
			serde_json::json!({
				"constant_score": {
					"filter": {
						"bool": {
							"must": [
								{ "term": { "doc_id": range.doc_id } },
								{ "range": {
									"page_number": {
										"gte": range.page_start,
										"lte": range.page_end,
									},
								} },
							],
						},
					},
					"boost": boost,
				},
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn range(doc_id: &str, title: &str, page_start: u32, page_end: u32) -> TocRange {
		TocRange { doc_id: doc_id.to_string(), title: title.to_string(), page_start, page_end }
	}

	#[test]
	fn queries_without_trigger_words_short_circuit() {
		assert!(!has_trigger("what is the total contract price"));
		assert!(has_trigger("where are the HVAC drawings"));
	}

	#[test]
	fn titles_must_share_a_trigger_word_with_the_query() {
		let kept = filter_toc_entries(
			"show the mechanical ventilation layout",
			vec![
				range("doc_1", "Mechanical Systems", 10, 24),
				range("doc_1", "Elevations", 25, 30),
			],
		);
		assert_eq!(kept.len(), 1);
		assert_eq!(kept[0].title, "Mechanical Systems");
	}

	#[test]
	fn boost_clauses_are_constant_score_page_ranges() {
		let clauses = boost_clauses(&[range("doc_1", "Mechanical", 10, 24)], 3.5);
		let clause = &clauses[0]["constant_score"];
		assert_eq!(clause["boost"], 3.5);
		assert_eq!(clause["filter"]["bool"]["must"][0]["term"]["doc_id"], "doc_1");
		assert_eq!(clause["filter"]["bool"]["must"][1]["range"]["page_number"]["gte"], 10);
	}
}
