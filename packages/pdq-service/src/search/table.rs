use color_eyre::Result;
use serde_json::Value;
use tracing::warn;

use pdq_domain::{TableRow, labels};

use crate::{
	PdqService,
	search::{ChunkHit, MatchOrigin, SearchRequest, filter, hybrid, vector},
};

const LABEL_BOOST: f32 = 10.0;

/// Lexical body for the table-row index. Extracted construction labels (wall
/// types, STC ratings, fire ratings) get a flat constant-score boost so an
/// exact label match dominates prose similarity.
pub fn table_bm25_body(query: &str, size: u32, filters: &[Value]) -> Value {
	let mut bool_query = serde_json::json!({
		"must": [{
			"multi_match": {
				"query": query,
				"fields": ["table_text^3", "table_label^2", "columns_text"],
				"type": "best_fields",
			},
		}],
		"filter": filters,
	});
	let extracted = labels::extract_labels(query);

	if !extracted.is_empty() {
		bool_query["should"] = serde_json::json!([{
			"constant_score": {
				"filter": { "terms": { "labels": extracted } },
				"boost": LABEL_BOOST,
			},
		}]);
	}

	serde_json::json!({ "size": size, "query": { "bool": bool_query } })
}

/// Hybrid retrieval over the table-row index, mirroring the chunk pipeline.
/// Rows come back flattened into chunks so downstream stages stay uniform.
pub async fn run_table(
	svc: &PdqService,
	req: &SearchRequest,
	query_vector: Option<&[f32]>,
) -> Result<Vec<ChunkHit>> {
	let size = svc.cfg.retrieval.table_size;
	let filters = filter::build_filter_clauses(&req.filters);
	let index = &svc.cfg.storage.search.table_index;
	let bm25_body = table_bm25_body(&req.query, size, &filters);
	let bm25 = async {
		svc.search.search(index, &bm25_body).await.map(|res| parse_row_hits(&res, MatchOrigin::Bm25))
	};
	let (bm25, knn) = match query_vector {
		Some(query_vector) => {
			let body = vector::knn_body(query_vector, size, svc.cfg.retrieval.num_candidates, &filters);

			tokio::join!(bm25, async {
				svc.search.search(index, &body).await.map(|res| parse_row_hits(&res, MatchOrigin::Knn))
			})
		},
		None => (bm25.await, Ok(Vec::new())),
	};
	let bm25 = bm25.unwrap_or_else(|err| {
		warn!(%err, "Table lexical branch failed.");

		Vec::new()
	});
	let knn = knn.unwrap_or_else(|err| {
		warn!(%err, "Table vector branch failed.");

		Vec::new()
	});

	Ok(hybrid::merge_hits(bm25, knn, |hit| hit.chunk.chunk_id.clone()))
}

fn parse_row_hits(res: &Value, matched: MatchOrigin) -> Vec<ChunkHit> {
	let Some(hits) = res.pointer("/hits/hits").and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	hits.iter()
		.filter_map(|hit| {
			let source = hit.get("_source")?;
			let row = match serde_json::from_value::<TableRow>(source.clone()) {
				Ok(row) => row,
				Err(err) => {
					warn!(%err, "Skipping a table hit with an undecodable source.");

					return None;
				},
			};
			let score = hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;

			Some(ChunkHit { chunk: row.into_chunk(), score, matched })
		})
		.collect()
}
