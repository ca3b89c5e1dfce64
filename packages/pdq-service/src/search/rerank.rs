use tracing::warn;

use crate::{PdqService, search::ChunkHit};

/// The reranking step never fails a request; unavailability is an ordinary
/// value the pipeline handles by keeping retrieval order.
#[derive(Debug)]
pub enum RerankOutcome {
	/// A total permutation of `0..candidates.len()`, most relevant first.
	Ranked(Vec<usize>),
	/// Missing credential or provider failure; callers keep identity order.
	Unavailable,
}

impl PdqService {
	/// Reorders candidates by cross-encoder relevance. Degrades to
	/// [`RerankOutcome::Unavailable`] instead of erroring.
	pub async fn rank(&self, query: &str, candidates: &[ChunkHit]) -> RerankOutcome {
		if candidates.is_empty() {
			return RerankOutcome::Ranked(Vec::new());
		}
		if self.cfg.providers.rerank.api_key.trim().is_empty() {
			return RerankOutcome::Unavailable;
		}

		let docs: Vec<String> = candidates.iter().map(|hit| hit.chunk.text.clone()).collect();

		match self.providers.rerank.rerank(&self.cfg.providers.rerank, query, &docs).await {
			Ok(order) => RerankOutcome::Ranked(complete_permutation(order, candidates.len())),
			Err(err) => {
				warn!(%err, "Rerank failed; keeping retrieval order.");

				RerankOutcome::Unavailable
			},
		}
	}
}

/// Forces the provider's ordering into a total permutation: out-of-range and
/// duplicate indices are dropped, missing indices appended in original order.
pub fn complete_permutation(order: Vec<usize>, len: usize) -> Vec<usize> {
	let mut seen = vec![false; len];
	let mut complete = Vec::with_capacity(len);

	for index in order {
		if index < len && !seen[index] {
			seen[index] = true;
			complete.push(index);
		}
	}
	for (index, seen) in seen.into_iter().enumerate() {
		if !seen {
			complete.push(index);
		}
	}

	complete
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_orderings_are_completed_in_original_order() {
		assert_eq!(complete_permutation(vec![3, 1], 5), vec![3, 1, 0, 2, 4]);
	}

	#[test]
	fn junk_indices_are_dropped() {
		assert_eq!(complete_permutation(vec![7, 1, 1, 0], 3), vec![1, 0, 2]);
	}

	#[test]
	fn empty_input_completes_to_identity() {
		assert_eq!(complete_permutation(Vec::new(), 3), vec![0, 1, 2]);
	}
}
