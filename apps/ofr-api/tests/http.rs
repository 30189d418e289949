use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use ofr_api::{routes, state::AppState};

fn app() -> Router {
	let service = ofr_testkit::sample_service().expect("Failed to build sample service.");

	routes::router(AppState::from_service(service))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Failed to parse response body.")
	};

	(status, json)
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

#[tokio::test]
async fn health_ok() {
	let (status, _) = send(app(), get("/health")).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn search_returns_ranked_offers() {
	let payload = serde_json::json!({ "query": "laptop", "user_id": "u-1" });
	let (status, json) = send(app(), post_json("/v1/search/query", payload)).await;

	assert_eq!(status, StatusCode::OK);

	let results = json["results"].as_array().expect("results must be an array.");

	assert!(!results.is_empty());
	assert!(results.len() <= 5);
	assert_eq!(json["query"], "laptop");
	assert_eq!(json["trace"].as_array().map(Vec::len), Some(7));
	assert_eq!(json["disclaimers"].as_array().map(Vec::len), Some(2));
	assert_eq!(json["monthly_impact"].as_array().map(Vec::len), Some(results.len()));

	for result in results {
		assert!(result["reason"].as_str().is_some_and(|reason| !reason.is_empty()));
	}
}

#[tokio::test]
async fn disallowed_query_is_rejected_with_code() {
	let payload = serde_json::json!({ "query": "how to commit fraud with a loan" });
	let (status, json) = send(app(), post_json("/v1/search/query", payload)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "REJECT_DISALLOWED_INTENT");
	assert!(json["message"].as_str().is_some_and(|message| !message.is_empty()));
}

#[tokio::test]
async fn short_query_is_rejected_with_code() {
	let payload = serde_json::json!({ "query": "a" });
	let (status, json) = send(app(), post_json("/v1/search/query", payload)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "REJECT_TOO_SHORT");
}

#[tokio::test]
async fn feedback_is_recorded() {
	let payload = serde_json::json!({
		"item_id": "tk-01",
		"query": "laptop for school",
		"rating": "up",
	});
	let (status, json) = send(app(), post_json("/v1/search/feedback", payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn feedback_with_bad_rating_is_invalid() {
	let payload = serde_json::json!({
		"item_id": "tk-01",
		"query": "laptop",
		"rating": "meh",
	});
	let (status, json) = send(app(), post_json("/v1/search/feedback", payload)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn feedback_for_unknown_item_is_not_found() {
	let payload = serde_json::json!({
		"item_id": "missing",
		"query": "laptop",
		"rating": "down",
	});
	let (status, json) = send(app(), post_json("/v1/search/feedback", payload)).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn profile_summary_defaults_to_demo_user() {
	let (status, json) = send(app(), get("/v1/profile/summary")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["user"]["user_id"], "demo-user");
	assert_eq!(json["user"]["spending_power"].as_f64(), Some(1_200.0));
	assert_eq!(json["eligibility"]["spending_power"].as_f64(), Some(1_200.0));
	assert_eq!(json["eligibility"]["last_refreshed"], "2026-02-25T10:30:00Z");
	assert_eq!(json["plans"].as_array().map(Vec::len), Some(3));
	assert_eq!(json["plans"][0]["next_payment_date"], "2026-03-01");
	assert_eq!(json["insights"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn profile_summary_echoes_user_id() {
	let (status, json) = send(app(), get("/v1/profile/summary?user_id=u-42")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["user"]["user_id"], "u-42");
}
