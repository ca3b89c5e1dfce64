use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::{
	PdqService, ServiceResult,
	search::{ChunkHit, MatchOrigin, SearchRequest, lexical, vector},
};

/// Runs the lexical and vector branches concurrently and merges them. One
/// failed branch degrades to the other; both failing yields an empty result
/// rather than an error.
pub async fn run_hybrid(
	svc: &PdqService,
	req: &SearchRequest,
	vector: Option<&[f32]>,
	boosts: &[Value],
) -> ServiceResult<Vec<ChunkHit>> {
	let lexical = lexical::run_bm25(svc, req, boosts);
	let (bm25, knn) = match vector {
		Some(vector) => tokio::join!(lexical, async { vector::run_knn(svc, req, vector).await }),
		None => (lexical.await, Ok(Vec::new())),
	};
	let bm25 = bm25.unwrap_or_else(|err| {
		warn!(%err, "Lexical branch failed; continuing with vector hits.");

		Vec::new()
	});
	let knn = knn.unwrap_or_else(|err| {
		warn!(%err, "Vector branch failed; continuing with lexical hits.");

		Vec::new()
	});

	Ok(merge_hits(bm25, knn, |hit| hit.chunk.chunk_id.clone()))
}

/// Union by stable identifier. A hit found by both branches keeps the higher
/// raw score and is tagged `hybrid`. The descending sort is provisional; it
/// only affects pre-rerank truncation.
pub fn merge_hits(
	first: Vec<ChunkHit>,
	second: Vec<ChunkHit>,
	key: impl Fn(&ChunkHit) -> String,
) -> Vec<ChunkHit> {
	let mut by_id: HashMap<String, usize> = HashMap::new();
	let mut merged: Vec<ChunkHit> = Vec::with_capacity(first.len() + second.len());

	for hit in first.into_iter().chain(second) {
		match by_id.get(&key(&hit)) {
			Some(&at) => {
				let kept = &mut merged[at];

				if hit.score > kept.score {
					kept.score = hit.score;
					kept.chunk = hit.chunk;
				}

				kept.matched = MatchOrigin::Hybrid;
			},
			None => {
				by_id.insert(key(&hit), merged.len());
				merged.push(hit);
			},
		}
	}

	merged.sort_by(|a, b| b.score.total_cmp(&a.score));

	merged
}

#[cfg(test)]
mod tests {
	use pdq_domain::{Chunk, Source};

	use super::*;

	fn hit(id: &str, score: f32, matched: MatchOrigin) -> ChunkHit {
		ChunkHit {
			chunk: Chunk {
				chunk_id: id.to_string(),
				doc_id: "doc_1".to_string(),
				project_id: "proj_1".to_string(),
				page_number: 1,
				section: None,
				text: String::new(),
				bbox: None,
				source: Source::Text,
				confidence: None,
			},
			score,
			matched,
		}
	}

	#[test]
	fn doubly_matched_hits_keep_higher_score_and_hybrid_tag() {
		let merged = merge_hits(
			vec![hit("a", 1.0, MatchOrigin::Bm25), hit("b", 4.0, MatchOrigin::Bm25)],
			vec![hit("a", 2.5, MatchOrigin::Knn)],
			|hit| hit.chunk.chunk_id.clone(),
		);
		assert_eq!(merged.len(), 2);
		assert_eq!(merged[0].chunk.chunk_id, "b");
		assert_eq!(merged[1].score, 2.5);
		assert_eq!(merged[1].matched, MatchOrigin::Hybrid);
	}

	#[test]
	fn merge_never_duplicates_identifiers() {
		let merged = merge_hits(
			vec![hit("a", 1.0, MatchOrigin::Bm25)],
			vec![hit("a", 0.5, MatchOrigin::Knn), hit("a", 0.2, MatchOrigin::Knn)],
			|hit| hit.chunk.chunk_id.clone(),
		);
		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].score, 1.0);
	}
}
