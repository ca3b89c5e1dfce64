use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Thin client for the OpenSearch-compatible engine holding the chunk and
/// table-row indices. Query bodies are built by the service layer; this only
/// posts them and surfaces engine errors.
pub struct SearchStore {
	client: Client,
	url: String,
	pub chunk_index: String,
	pub table_index: String,
	username: Option<String>,
	password: Option<String>,
}
impl SearchStore {
	pub fn new(cfg: &pdq_config::SearchEngine) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			url: cfg.url.clone(),
			chunk_index: cfg.chunk_index.clone(),
			table_index: cfg.table_index.clone(),
			username: cfg.username.clone(),
			password: cfg.password.clone(),
		})
	}

	pub async fn search(&self, index: &str, body: &Value) -> Result<Value> {
		let mut req = self.client.post(format!("{}/{index}/_search", self.url)).json(body);

		if let Some(username) = &self.username {
			req = req.basic_auth(username, self.password.as_deref());
		}

		let res = req.send().await?;
		let status = res.status();

		if !status.is_success() {
			return Err(Error::Engine {
				status: status.as_u16(),
				body: res.text().await.unwrap_or_default(),
			});
		}

		Ok(res.json().await?)
	}
}
