use color_eyre::Result;
use serde_json::Value;
use tracing::warn;

use pdq_domain::Chunk;

use crate::{
	PdqService,
	search::{ChunkHit, MatchOrigin, SearchRequest, filter, parse_chunk_hits},
};

/// Approximate nearest-neighbor body. Filters are applied as a post-filter;
/// the ANN index cannot pre-filter, so candidates are over-fetched via
/// `num_candidates` to keep recall acceptable.
pub fn knn_body(vector: &[f32], size: u32, num_candidates: u32, filters: &[Value]) -> Value {
	serde_json::json!({
		"size": size,
		"knn": {
			"field": "vector",
			"query_vector": vector,
			"k": size,
			"num_candidates": num_candidates,
		},
		"post_filter": { "bool": { "filter": filters } },
		"_source": { "excludes": ["vector"] },
	})
}

pub async fn run_knn(
	svc: &PdqService,
	req: &SearchRequest,
	vector: &[f32],
) -> Result<Vec<ChunkHit>> {
	let size = req.size.unwrap_or(svc.cfg.retrieval.size);
	let filters = filter::build_filter_clauses(&req.filters);
	let body = knn_body(vector, size, svc.cfg.retrieval.num_candidates, &filters);

	match svc.search.search(&svc.cfg.storage.search.chunk_index, &body).await {
		Ok(res) => Ok(parse_chunk_hits(&res, MatchOrigin::Knn)),
		Err(err) => {
			warn!(%err, "ANN query failed; falling back to brute-force cosine.");

			brute_force(svc, &filters, vector, size).await
		},
	}
}

/// Fetches filter-matching documents with their stored vectors and scores
/// them in-process. Bounded so a large project cannot blow up one request.
async fn brute_force(
	svc: &PdqService,
	filters: &[Value],
	vector: &[f32],
	size: u32,
) -> Result<Vec<ChunkHit>> {
	let fetch = fallback_fetch(size, svc.cfg.retrieval.fallback_fetch_cap);
	let body = serde_json::json!({
		"size": fetch,
		"query": { "bool": { "filter": filters } },
	});
	let res = svc.search.search(&svc.cfg.storage.search.chunk_index, &body).await?;
	let Some(hits) = res.pointer("/hits/hits").and_then(|v| v.as_array()) else {
		return Ok(Vec::new());
	};

	let mut scored = Vec::new();
	for hit in hits {
		let Some(source) = hit.get("_source") else {
			continue;
		};
		let Some(stored) = source.get("vector").and_then(|v| v.as_array()) else {
			continue;
		};
		let stored: Vec<f32> =
			stored.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
		let Ok(chunk) = serde_json::from_value::<Chunk>(source.clone()) else {
			continue;
		};

		scored.push(ChunkHit {
			chunk,
			score: cosine_similarity(vector, &stored),
			matched: MatchOrigin::Knn,
		});
	}

	scored.sort_by(|a, b| b.score.total_cmp(&a.score));
	scored.truncate(size as usize);

	Ok(scored)
}

fn fallback_fetch(size: u32, cap: u32) -> u32 {
	size.saturating_mul(5).min(cap)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cosine_matches_hand_computed_values() {
		assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
		assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
		assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]) - 0.70710677).abs() < 1e-6);
	}

	#[test]
	fn zero_norm_and_mismatched_lengths_score_zero() {
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
		assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
	}

	#[test]
	fn fallback_fetch_is_capped_and_never_overflows() {
		assert_eq!(fallback_fetch(64, 500), 320);
		assert_eq!(fallback_fetch(200, 500), 500);
		assert_eq!(fallback_fetch(u32::MAX, 500), 500);
	}

	#[test]
	fn knn_body_post_filters() {
		let filters = vec![serde_json::json!({ "term": { "project_id.keyword": "proj_1" } })];
		let body = knn_body(&[0.1, 0.2], 64, 200, &filters);
		assert_eq!(body["knn"]["num_candidates"], 200);
		assert_eq!(body["post_filter"]["bool"]["filter"][0], filters[0]);
	}
}
