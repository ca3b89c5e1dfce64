use color_eyre::Result;
use serde_json::Value;

use crate::{
	PdqService,
	search::{ChunkHit, MatchOrigin, SearchRequest, filter, parse_chunk_hits},
};

/// Best-fields text query; body text dominates the section label. Boost
/// clauses are optional scoring clauses and never constrain the result set.
pub fn bm25_body(query: &str, size: u32, filters: &[Value], boosts: &[Value]) -> Value {
	let mut bool_query = serde_json::json!({
		"must": [{
			"multi_match": {
				"query": query,
				"fields": ["text^3", "section"],
				"type": "best_fields",
			},
		}],
		"filter": filters,
	});

	if !boosts.is_empty() {
		bool_query["should"] = Value::Array(boosts.to_vec());
	}

	serde_json::json!({
		"size": size,
		"query": { "bool": bool_query },
		"_source": { "excludes": ["vector"] },
	})
}

pub async fn run_bm25(
	svc: &PdqService,
	req: &SearchRequest,
	boosts: &[Value],
) -> Result<Vec<ChunkHit>> {
	let size = req.size.unwrap_or(svc.cfg.retrieval.size);
	let filters = filter::build_filter_clauses(&req.filters);
	let body = bm25_body(&req.query, size, &filters, boosts);
	let res = svc.search.search(&svc.cfg.storage.search.chunk_index, &body).await?;

	Ok(parse_chunk_hits(&res, MatchOrigin::Bm25))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn boosts_land_in_should_without_constraining() {
		let boost = serde_json::json!({ "constant_score": { "boost": 3.5 } });
		let body = bm25_body("fire rating", 64, &[], &[boost.clone()]);
		assert_eq!(body["query"]["bool"]["should"][0], boost);
		assert!(body["query"]["bool"]["minimum_should_match"].is_null());
	}

	#[test]
	fn body_weights_text_over_section() {
		let body = bm25_body("fire rating", 64, &[], &[]);
		assert_eq!(
			body["query"]["bool"]["must"][0]["multi_match"]["fields"],
			serde_json::json!(["text^3", "section"])
		);
		assert!(body["query"]["bool"]["should"].is_null());
	}
}
