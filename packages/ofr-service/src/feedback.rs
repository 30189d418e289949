use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use ofr_domain::guardrail;

use crate::{Error, OfferService, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
	Up,
	Down,
}
impl Rating {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"up" => Some(Self::Up),
			"down" => Some(Self::Down),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Up => "up",
			Self::Down => "down",
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedbackRequest {
	pub item_id: String,
	pub query: String,
	pub rating: String,
	#[serde(default)]
	pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackRecord {
	pub item_id: String,
	/// Stored with PII redacted.
	pub query: String,
	pub rating: Rating,
	pub reason: Option<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub recorded_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackResponse {
	pub status: String,
}

/// Append-only, process-local feedback store.
#[derive(Debug, Default)]
pub struct FeedbackLog {
	records: Mutex<Vec<FeedbackRecord>>,
}
impl FeedbackLog {
	pub fn append(&self, record: FeedbackRecord) {
		let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());

		records.push(record);
	}

	pub fn snapshot(&self) -> Vec<FeedbackRecord> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn len(&self) -> usize {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl OfferService {
	pub fn record_feedback(&self, req: FeedbackRequest) -> Result<FeedbackResponse> {
		let Some(rating) = Rating::parse(&req.rating) else {
			return Err(Error::InvalidRequest {
				message: format!("rating must be \"up\" or \"down\"; got {:?}.", req.rating),
			});
		};

		if !self.index.items().iter().any(|item| item.id == req.item_id) {
			return Err(Error::NotFound { message: format!("Unknown item_id {}.", req.item_id) });
		}

		let record = FeedbackRecord {
			item_id: req.item_id,
			query: guardrail::redact_pii(&req.query),
			rating,
			reason: req.reason.map(|reason| guardrail::redact_pii(&reason)),
			recorded_at: OffsetDateTime::now_utc(),
		};

		tracing::info!(item_id = %record.item_id, rating = rating.as_str(), "Feedback recorded.");

		self.feedback.append(record);

		Ok(FeedbackResponse { status: "ok".to_string() })
	}
}
