use tokio::sync::mpsc::Sender;
use tracing::warn;
use uuid::Uuid;

use pdq_domain::{NOT_FOUND_ANSWER, is_not_found, repair::AnswerScanner};

use crate::{
	PdqService, ServiceResult,
	jobs::JobState,
	qa::{
		QaEvent, QaRequest,
		answer::{ANSWER_MAX_TOKENS, ANSWER_TEMPERATURE, search_request},
		synth,
	},
};

const DISCONNECT_MESSAGE: &str = "Client disconnected before the stream finished.";

/// How a streaming run ended. Delivery of the terminal event counts: a run
/// whose receiver went away never handed over its result.
enum StreamEnd {
	Completed,
	Failed { message: String },
}

impl PdqService {
	/// Streaming variant of [`PdqService::answer`]. Emits `status` events
	/// between stages, `chunk` events with incremental answer text as the
	/// generation arrives, and exactly one terminal `done` or `error` event.
	/// Never returns an error; a dropped receiver simply stops the pipeline.
	pub async fn answer_stream(&self, req: &QaRequest, tx: Sender<QaEvent>) {
		self.stream_pipeline(req, tx).await;
	}

	/// Runs the streaming pipeline under an explicit job record
	/// (`pending → processing → completed|failed`) and returns the job id once
	/// the run has reached a terminal state. The state outlives the stream, so
	/// a caller that lost the event channel can still ask
	/// [`PdqService::job_status`] what became of the run.
	pub async fn answer_job(&self, req: &QaRequest, tx: Sender<QaEvent>) -> ServiceResult<Uuid> {
		let job_id = self.jobs.create()?;

		self.jobs.transition(job_id, JobState::Processing)?;

		let next = match self.stream_pipeline(req, tx).await {
			StreamEnd::Completed => JobState::Completed,
			StreamEnd::Failed { message } => JobState::Failed { message },
		};

		self.jobs.transition(job_id, next)?;

		Ok(job_id)
	}

	async fn stream_pipeline(&self, req: &QaRequest, tx: Sender<QaEvent>) -> StreamEnd {
		if !emit(&tx, QaEvent::Status { message: "Searching documents.".to_string() }).await {
			return disconnected();
		}

		let hits = match self.retrieve_evidence(&search_request(req)).await {
			Ok(hits) => hits,
			Err(err) => {
				let message = err.to_string();

				emit(&tx, QaEvent::Error { message: message.clone() }).await;

				return StreamEnd::Failed { message };
			},
		};

		if hits.is_empty() {
			return finish(&tx, QaEvent::Done {
				answer: NOT_FOUND_ANSWER.to_string(),
				citations: Vec::new(),
				suggestions: Vec::new(),
			})
			.await;
		}
		if !emit(&tx, QaEvent::Status { message: "Ranking results.".to_string() }).await {
			return disconnected();
		}

		let (context, evidence) = self.rank_and_select(&req.question, hits).await;

		if !emit(&tx, QaEvent::Status { message: "Generating answer.".to_string() }).await {
			return disconnected();
		}

		let messages = synth::build_messages(&req.question, &context);
		let mut scanner = AnswerScanner::new();

		match self
			.providers
			.chat
			.stream(&self.cfg.providers.chat, &messages, ANSWER_TEMPERATURE, ANSWER_MAX_TOKENS)
			.await
		{
			Ok(mut deltas) => loop {
				match deltas.next_delta().await {
					Ok(Some(delta)) => {
						if let Some(new_text) = scanner.push(&delta)
							&& !emit(&tx, QaEvent::Chunk { content: new_text }).await
						{
							return disconnected();
						}
					},
					Ok(None) => break,
					Err(err) => {
						// Keep whatever arrived; the fallback path can still
						// use the partial answer.
						warn!(%err, "Generation stream broke mid-flight.");

						break;
					},
				}
			},
			Err(err) => {
				warn!(%err, "Streaming unavailable; degrading to a single-shot call.");

				match self
					.providers
					.chat
					.complete(&self.cfg.providers.chat, &messages, ANSWER_TEMPERATURE, ANSWER_MAX_TOKENS)
					.await
				{
					Ok(raw) => {
						if let Some(new_text) = scanner.push(&raw)
							&& !emit(&tx, QaEvent::Chunk { content: new_text }).await
						{
							return disconnected();
						}
					},
					Err(err) => {
						warn!(%err, "Generation failed; falling back to evidence citations.");

						let (answer, citations) = synth::conservative_fallback(&evidence);

						return finish(&tx, QaEvent::Done {
							answer,
							citations,
							suggestions: Vec::new(),
						})
						.await;
					},
				}
			},
		}

		let (answer, citations) = match synth::parse_answer(scanner.raw()) {
			Some(parsed) => synth::repair_citations(parsed, &evidence),
			None => {
				// The scanner's partial extraction beats a canned sentence.
				let extracted = scanner.current();

				if extracted.is_empty() {
					synth::conservative_fallback(&evidence)
				} else if is_not_found(extracted) {
					(extracted.to_string(), Vec::new())
				} else {
					(extracted.to_string(), synth::fallback_citations(&evidence))
				}
			},
		};
		let mut suggestions = Vec::new();

		if is_not_found(&answer) && self.cfg.suggestions.enabled {
			if !emit(&tx, QaEvent::Status { message: "Finding alternative queries.".to_string() })
				.await
			{
				return disconnected();
			}

			suggestions = self.find_working_suggestions(&req.question, &req.filters).await;
		}

		finish(&tx, QaEvent::Done { answer, citations, suggestions }).await
	}
}

async fn emit(tx: &Sender<QaEvent>, event: QaEvent) -> bool {
	tx.send(event).await.is_ok()
}

async fn finish(tx: &Sender<QaEvent>, done: QaEvent) -> StreamEnd {
	if emit(tx, done).await { StreamEnd::Completed } else { disconnected() }
}

fn disconnected() -> StreamEnd {
	StreamEnd::Failed { message: DISCONNECT_MESSAGE.to_string() }
}
