pub mod filter;
pub mod hybrid;
pub mod lexical;
pub mod rerank;
pub mod table;
pub mod vector;

use tracing::warn;

use pdq_domain::Chunk;

use crate::{PdqService, ServiceError, ServiceResult};

/// Metadata filter values accept a single value or a list; both compile to
/// exact keyword matches.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
	One(String),
	Many(Vec<String>),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchFilters {
	pub project_id: String,
	pub doc_id: Option<FilterValue>,
	pub doc_type: Option<FilterValue>,
	pub discipline: Option<FilterValue>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub filters: SearchFilters,
	pub size: Option<u32>,
}

/// Which retrieval branch produced a hit. Hits found by both branches are
/// tagged `hybrid` and keep the higher score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
	Bm25,
	Knn,
	Hybrid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkHit {
	pub chunk: Chunk,
	pub score: f32,
	pub matched: MatchOrigin,
}

impl PdqService {
	/// Hybrid lexical-plus-vector retrieval over page chunks. A failed
	/// embedding degrades to lexical-only; a failed branch degrades to the
	/// surviving branch.
	pub async fn search_chunks(&self, req: SearchRequest) -> ServiceResult<Vec<ChunkHit>> {
		validate(&req)?;

		let boosts = self.toc_boost(&req.query, &req.filters).await;
		let vector = self.embed_query(&req.query).await;

		hybrid::run_hybrid(self, &req, vector.as_deref(), &boosts).await
	}

	/// Everything the answer pipeline ranks: hybrid chunk hits with table-row
	/// hits concatenated after them.
	pub(crate) async fn retrieve_evidence(&self, req: &SearchRequest) -> ServiceResult<Vec<ChunkHit>> {
		validate(req)?;

		let boosts = self.toc_boost(&req.query, &req.filters).await;
		let vector = self.embed_query(&req.query).await;
		let (chunks, tables) = tokio::join!(
			hybrid::run_hybrid(self, req, vector.as_deref(), &boosts),
			table::run_table(self, req, vector.as_deref()),
		);
		let mut hits = chunks?;

		match tables {
			Ok(tables) => hits.extend(tables),
			Err(err) => warn!(%err, "Table search failed; continuing with chunk hits."),
		}

		Ok(hits)
	}

	async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
		let texts = [query.to_string()];

		match self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await {
			Ok(mut vectors) if !vectors.is_empty() => Some(vectors.swap_remove(0)),
			Ok(_) => {
				warn!("Embedding provider returned no vectors; skipping the vector branch.");

				None
			},
			Err(err) => {
				warn!(%err, "Query embedding failed; skipping the vector branch.");

				None
			},
		}
	}
}

/// Decodes an engine `_search` response into scored hits. Hits whose source
/// does not decode are skipped rather than failing the branch.
pub(crate) fn parse_chunk_hits(res: &serde_json::Value, matched: MatchOrigin) -> Vec<ChunkHit> {
	let Some(hits) = res.pointer("/hits/hits").and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	hits.iter()
		.filter_map(|hit| {
			let source = hit.get("_source")?;
			let chunk = match serde_json::from_value::<Chunk>(source.clone()) {
				Ok(chunk) => chunk,
				Err(err) => {
					warn!(%err, "Skipping a hit with an undecodable source.");

					return None;
				},
			};
			let score = hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;

			Some(ChunkHit { chunk, score, matched })
		})
		.collect()
}

fn validate(req: &SearchRequest) -> ServiceResult<()> {
	if req.query.trim().is_empty() {
		return Err(ServiceError::InvalidRequest { message: "Query must not be empty.".to_string() });
	}
	if req.filters.project_id.trim().is_empty() {
		return Err(ServiceError::InvalidRequest {
			message: "project_id must not be empty.".to_string(),
		});
	}

	Ok(())
}
