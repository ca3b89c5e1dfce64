use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Calls the rerank endpoint and returns the candidate indices in relevance
/// order. Every input index appears exactly once; indices the provider
/// omitted are appended in their original order.
pub async fn rerank(
	cfg: &pdq_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<usize>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<usize>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Rerank response is missing results array."))?;

	let mut order = Vec::with_capacity(doc_count);
	let mut seen = vec![false; doc_count];
	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| eyre::eyre!("Rerank result missing index."))? as usize;
		if index < doc_count && !seen[index] {
			seen[index] = true;
			order.push(index);
		}
	}
	for (index, seen) in seen.into_iter().enumerate() {
		if !seen {
			order.push(index);
		}
	}

	Ok(order)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_by_provider_ranking() {
		let json = serde_json::json!({
			"results": [
				{ "index": 2, "relevance_score": 0.9 },
				{ "index": 0, "relevance_score": 0.4 }
			]
		});
		let order = parse_rerank_response(json, 3).expect("parse failed");
		assert_eq!(order, vec![2, 0, 1]);
	}

	#[test]
	fn ignores_out_of_range_and_duplicate_indices() {
		let json = serde_json::json!({
			"results": [
				{ "index": 9 },
				{ "index": 1 },
				{ "index": 1 }
			]
		});
		let order = parse_rerank_response(json, 2).expect("parse failed");
		assert_eq!(order, vec![1, 0]);
	}
}
