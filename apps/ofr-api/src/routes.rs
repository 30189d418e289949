use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use ofr_service::{
	Error, FeedbackRequest, FeedbackResponse, ProfileSummary, SearchRequest, SearchResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search/query", post(search))
		.route("/v1/search/feedback", post(feedback))
		.route("/v1/profile/summary", get(profile_summary))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
	#[serde(default = "default_user_id")]
	pub user_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::Rejected { code, message } =>
				ApiError::new(StatusCode::BAD_REQUEST, code.as_str(), message),
			Error::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			Error::NotFound { message } =>
				ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::Provider { message } => {
				tracing::error!(error = %message, "Upstream provider failed.");

				ApiError::new(
					StatusCode::BAD_GATEWAY,
					"PROVIDER_ERROR",
					"Upstream provider failed.",
				)
			},
			Error::Catalog { message } | Error::Index { message } => {
				tracing::error!(error = %message, "Internal error.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"INTERNAL_ERROR",
					"Internal error.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn feedback(
	State(state): State<AppState>,
	Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
	let response = state.service.record_feedback(payload)?;

	Ok(Json(response))
}

async fn profile_summary(
	State(state): State<AppState>,
	Query(query): Query<ProfileQuery>,
) -> Result<Json<ProfileSummary>, ApiError> {
	let response = state.service.profile_summary(&query.user_id).await?;

	Ok(Json(response))
}

fn default_user_id() -> String {
	"demo-user".to_string()
}
