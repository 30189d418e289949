use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Error, Result};

/// HTTP client for a cross-encoder relevance model that scores (query, document) pairs.
#[derive(Clone, Debug)]
pub struct RerankClient {
	client: Client,
	url: String,
	model: String,
	headers: HeaderMap,
}
impl RerankClient {
	pub fn new(cfg: &ofr_config::ProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
		let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);

		Ok(Self { client, url, model: cfg.model.clone(), headers })
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub async fn score(&self, query: &str, docs: &[String]) -> Result<Vec<f32>> {
		if docs.is_empty() {
			return Ok(Vec::new());
		}

		let body = serde_json::json!({ "model": self.model, "query": query, "documents": docs });
		let res =
			self.client.post(&self.url).headers(self.headers.clone()).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_rerank_response(json, docs.len())
	}
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Rerank response is missing results array."))?;
	let mut scores: Vec<Option<f32>> = vec![None; doc_count];

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| invalid("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| invalid("Rerank result missing score."))? as f32;
		let Some(slot) = scores.get_mut(index) else {
			return Err(invalid("Rerank result index is out of range."));
		};

		*slot = Some(score);
	}

	scores
		.into_iter()
		.collect::<Option<Vec<f32>>>()
		.ok_or_else(|| invalid("Rerank response did not score every document."))
}

fn invalid(message: &str) -> Error {
	Error::InvalidResponse { message: message.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_scores_by_index() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![0.9, 0.2]);
	}

	#[test]
	fn missing_scores_are_an_error() {
		let json = serde_json::json!({ "data": [{ "index": 0, "score": 0.4 }] });

		assert!(parse_rerank_response(json, 2).is_err());
	}

	#[test]
	fn out_of_range_index_is_an_error() {
		let json = serde_json::json!({ "results": [{ "index": 3, "score": 0.4 }] });

		assert!(parse_rerank_response(json, 1).is_err());
	}
}
