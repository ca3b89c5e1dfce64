use tracing::warn;

use pdq_domain::{Chunk, Citation, NOT_FOUND_ANSWER, is_not_found};

use crate::{
	PdqService, ServiceResult,
	qa::{QaRequest, QaResult, context, synth},
	search::{ChunkHit, SearchRequest, rerank::RerankOutcome},
};

pub(crate) const ANSWER_TEMPERATURE: f32 = 0.0;
pub(crate) const ANSWER_MAX_TOKENS: u32 = 600;

pub(crate) struct PipelineOutcome {
	pub answer: String,
	pub citations: Vec<Citation>,
	/// True when the generative step itself concluded "not found"; only then
	/// is the suggestion engine worth invoking.
	pub generated_not_found: bool,
}

impl PdqService {
	/// Full question answering: retrieve, rerank, build context, generate,
	/// repair citations, and on a generated not-found, test alternative
	/// phrasings.
	pub async fn answer(&self, req: &QaRequest) -> ServiceResult<QaResult> {
		let outcome = self.answer_pipeline(req).await?;
		let mut result = QaResult {
			answer: outcome.answer,
			citations: outcome.citations,
			suggestions: None,
		};

		if outcome.generated_not_found && self.cfg.suggestions.enabled {
			let suggestions = self.find_working_suggestions(&req.question, &req.filters).await;

			if !suggestions.is_empty() {
				result.suggestions = Some(suggestions);
			}
		}

		Ok(result)
	}

	/// The same pipeline without the suggestion stage. The suggestion engine
	/// tests candidate phrasings through this entry point, so recursion is
	/// impossible by construction.
	pub async fn answer_evidence_only(&self, req: &QaRequest) -> ServiceResult<QaResult> {
		let outcome = self.answer_pipeline(req).await?;

		Ok(QaResult { answer: outcome.answer, citations: outcome.citations, suggestions: None })
	}

	pub(crate) async fn answer_pipeline(&self, req: &QaRequest) -> ServiceResult<PipelineOutcome> {
		let hits = self.retrieve_evidence(&search_request(req)).await?;

		if hits.is_empty() {
			return Ok(PipelineOutcome {
				answer: NOT_FOUND_ANSWER.to_string(),
				citations: Vec::new(),
				generated_not_found: false,
			});
		}

		let (context, evidence) = self.rank_and_select(&req.question, hits).await;

		if evidence.is_empty() {
			return Ok(PipelineOutcome {
				answer: NOT_FOUND_ANSWER.to_string(),
				citations: Vec::new(),
				generated_not_found: true,
			});
		}

		let messages = synth::build_messages(&req.question, &context);
		let raw = match self
			.providers
			.chat
			.complete(&self.cfg.providers.chat, &messages, ANSWER_TEMPERATURE, ANSWER_MAX_TOKENS)
			.await
		{
			Ok(raw) => raw,
			Err(err) => {
				warn!(%err, "Generation failed; falling back to evidence citations.");

				let (answer, citations) = synth::conservative_fallback(&evidence);

				return Ok(PipelineOutcome { answer, citations, generated_not_found: false });
			},
		};
		let Some(parsed) = synth::parse_answer(&raw) else {
			let (answer, citations) = synth::conservative_fallback(&evidence);

			return Ok(PipelineOutcome { answer, citations, generated_not_found: false });
		};
		let (answer, citations) = synth::repair_citations(parsed, &evidence);
		let generated_not_found = is_not_found(&answer);

		Ok(PipelineOutcome { answer, citations, generated_not_found })
	}

	/// Rerank the candidate pool, keep the top N, and render them into the
	/// generation context.
	pub(crate) async fn rank_and_select(
		&self,
		question: &str,
		hits: Vec<ChunkHit>,
	) -> (String, Vec<Chunk>) {
		let order = match self.rank(question, &hits).await {
			RerankOutcome::Ranked(order) => order,
			RerankOutcome::Unavailable => (0..hits.len()).collect(),
		};
		let top: Vec<ChunkHit> = order
			.into_iter()
			.take(self.cfg.retrieval.rerank_top_n as usize)
			.map(|index| hits[index].clone())
			.collect();
		let candidates = context::dedupe_for_context(&top, self.cfg.context.max_chunks as usize);

		context::build_context(candidates, &self.cfg.context, &self.token_counter())
	}
}

pub(crate) fn search_request(req: &QaRequest) -> SearchRequest {
	SearchRequest { query: req.question.clone(), filters: req.filters.clone(), size: req.size }
}
