use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use ofr_domain::{Category, ConstraintSet, EligibilityTier, guardrail::RejectCode, intent::Refine};

use crate::{
	Candidate, Error, OfferService, Result, eligibility,
	explain::{self, MonthlyImpact},
	rank::{self, Weights},
	rerank,
	retrieve::{self, RetrievalPath},
};

const DEFAULT_USER_ID: &str = "demo-user";
const DEFAULT_DISCLOSURE: &str = "Final approval happens at checkout.";

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default = "default_personalized")]
	pub personalized: bool,
	#[serde(default)]
	pub refine: Option<Refine>,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), user_id: None, personalized: true, refine: None }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
	Ingress,
	Intent,
	Retrieve,
	Rerank,
	Rank,
	Eligibility,
	Explain,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ingress => "ingress",
			Self::Intent => "intent",
			Self::Retrieve => "retrieve",
			Self::Rerank => "rerank",
			Self::Rank => "rank",
			Self::Eligibility => "eligibility",
			Self::Explain => "explain",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceStep {
	pub step: String,
	pub elapsed_ms: f64,
	pub notes: String,
}
impl TraceStep {
	fn finish(stage: Stage, started: Instant, notes: String) -> Self {
		let elapsed_ms = (started.elapsed().as_secs_f64() * 10_000.0).round() / 10.0;

		Self { step: stage.as_str().to_string(), elapsed_ms, notes }
	}
}

/// Everything a search accumulates while its stages run.
#[derive(Clone, Debug)]
pub struct PipelineState {
	pub request_id: Uuid,
	pub query: String,
	pub user_id: String,
	pub personalized: bool,
	pub refine: Option<Refine>,
	pub sanitized_query: String,
	pub constraints: ConstraintSet,
	pub applied_constraints: BTreeMap<String, String>,
	pub candidates: Vec<Candidate>,
	pub reranked: Vec<Candidate>,
	pub ranked: Vec<Candidate>,
	pub summary: String,
	pub retrieval_path: Option<RetrievalPath>,
	pub rerank_timed_out: bool,
	pub rejection: Option<RejectCode>,
	pub trace: Vec<TraceStep>,
}
impl PipelineState {
	pub fn new(req: SearchRequest) -> Self {
		let user_id = req
			.user_id
			.map(|user_id| user_id.trim().to_string())
			.filter(|user_id| !user_id.is_empty())
			.unwrap_or_else(|| DEFAULT_USER_ID.to_string());

		Self {
			request_id: Uuid::new_v4(),
			query: req.query,
			user_id,
			personalized: req.personalized,
			refine: req.refine,
			sanitized_query: String::new(),
			constraints: ConstraintSet::default(),
			applied_constraints: BTreeMap::new(),
			candidates: Vec::new(),
			reranked: Vec::new(),
			ranked: Vec::new(),
			summary: String::new(),
			retrieval_path: None,
			rerank_timed_out: false,
			rejection: None,
			trace: Vec::new(),
		}
	}

	/// Overwrites the fields the update sets and appends its trace entries.
	pub fn merge(&mut self, update: StageUpdate) {
		if let Some(sanitized_query) = update.sanitized_query {
			self.sanitized_query = sanitized_query;
		}
		if let Some(constraints) = update.constraints {
			self.constraints = constraints;
		}
		if let Some(applied_constraints) = update.applied_constraints {
			self.applied_constraints = applied_constraints;
		}
		if let Some(candidates) = update.candidates {
			self.candidates = candidates;
		}
		if let Some(reranked) = update.reranked {
			self.reranked = reranked;
		}
		if let Some(ranked) = update.ranked {
			self.ranked = ranked;
		}
		if let Some(summary) = update.summary {
			self.summary = summary;
		}
		if let Some(path) = update.retrieval_path {
			self.retrieval_path = Some(path);
		}
		if let Some(timed_out) = update.rerank_timed_out {
			self.rerank_timed_out = timed_out;
		}
		if let Some(code) = update.rejection {
			self.rejection = Some(code);
		}

		self.trace.extend(update.trace);
	}
}

/// Partial state produced by one stage. Unset fields leave the state untouched.
#[derive(Clone, Debug, Default)]
pub struct StageUpdate {
	pub sanitized_query: Option<String>,
	pub constraints: Option<ConstraintSet>,
	pub applied_constraints: Option<BTreeMap<String, String>>,
	pub candidates: Option<Vec<Candidate>>,
	pub reranked: Option<Vec<Candidate>>,
	pub ranked: Option<Vec<Candidate>>,
	pub summary: Option<String>,
	pub retrieval_path: Option<RetrievalPath>,
	pub rerank_timed_out: Option<bool>,
	pub rejection: Option<RejectCode>,
	pub trace: Vec<TraceStep>,
}
impl StageUpdate {
	fn traced(mut self, stage: Stage, started: Instant, notes: String) -> Self {
		let step = TraceStep::finish(stage, started, notes);

		tracing::debug!(
			stage = stage.as_str(),
			elapsed_ms = step.elapsed_ms,
			notes = %step.notes,
			"Stage finished."
		);

		self.trace.push(step);

		self
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct OfferResult {
	pub id: String,
	pub merchant: String,
	pub product: String,
	pub category: Category,
	pub total_price: f64,
	pub term_months: u32,
	pub apr: f64,
	pub monthly_payment: f64,
	pub eligibility: Option<EligibilityTier>,
	pub score: f64,
	pub capped: bool,
	pub reason: String,
	pub disclosure: String,
}
impl From<Candidate> for OfferResult {
	fn from(candidate: Candidate) -> Self {
		let Candidate { item, rank, eligibility, capped, reason, .. } = candidate;

		Self {
			id: item.id,
			merchant: item.merchant,
			product: item.product,
			category: item.category,
			total_price: item.total_price,
			term_months: item.term_months,
			apr: item.apr,
			monthly_payment: item.monthly_payment,
			eligibility,
			score: rank.unwrap_or(0.0),
			capped,
			reason: reason.unwrap_or_default(),
			disclosure: item.disclosure.unwrap_or_else(|| DEFAULT_DISCLOSURE.to_string()),
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub request_id: Uuid,
	pub query: String,
	pub summary: String,
	pub results: Vec<OfferResult>,
	pub monthly_impact: Vec<MonthlyImpact>,
	pub applied_constraints: BTreeMap<String, String>,
	pub retrieval_path: RetrievalPath,
	pub rerank_timed_out: bool,
	pub trace: Vec<TraceStep>,
	pub disclaimers: Vec<String>,
}
impl From<PipelineState> for SearchResponse {
	fn from(state: PipelineState) -> Self {
		let monthly_impact = explain::monthly_impact(&state.ranked);

		Self {
			request_id: state.request_id,
			query: state.query,
			summary: state.summary,
			results: state.ranked.into_iter().map(OfferResult::from).collect(),
			monthly_impact,
			applied_constraints: state.applied_constraints,
			retrieval_path: state.retrieval_path.unwrap_or(RetrievalPath::FallbackUnfiltered),
			rerank_timed_out: state.rerank_timed_out,
			trace: state.trace,
			disclaimers: explain::DISCLAIMERS.iter().map(|line| line.to_string()).collect(),
		}
	}
}

impl OfferService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let state = self.run_pipeline(req).await;

		if let Some(code) = state.rejection {
			return Err(Error::from(code));
		}

		Ok(SearchResponse::from(state))
	}

	/// Runs every stage in order and returns the final state, including a rejected one.
	pub async fn run_pipeline(&self, req: SearchRequest) -> PipelineState {
		let mut state = PipelineState::new(req);
		let span = tracing::info_span!("search", request_id = %state.request_id);

		async move {
			tracing::info!(user_id = %state.user_id, "Search started.");

			state.merge(self.ingress(&state));

			if let Some(code) = state.rejection {
				tracing::info!(code = code.as_str(), "Search rejected at ingress.");

				return state;
			}

			state.merge(self.intent(&state));
			state.merge(self.retrieve(&state).await);
			state.merge(self.rerank(&state).await);
			state.merge(self.rank(&state));
			state.merge(self.eligibility(&state).await);
			state.merge(self.explain(&state));

			tracing::info!(
				results = state.ranked.len(),
				path = ?state.retrieval_path,
				"Search finished."
			);

			state
		}
		.instrument(span)
		.await
	}

	fn ingress(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let outcome = self.providers.guard.guard(&state.query);
		let notes = match outcome.rejection {
			Some(code) => format!("rejected: {}", code.as_str()),
			None => format!("sanitized, pii-stripped, len={}", outcome.cleaned.chars().count()),
		};

		StageUpdate {
			sanitized_query: Some(outcome.cleaned),
			rejection: outcome.rejection,
			..Default::default()
		}
		.traced(Stage::Ingress, started, notes)
	}

	fn intent(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let intent = self.providers.intent.extract(&state.sanitized_query, state.refine.as_ref());
		let notes = if intent.applied.is_empty() {
			format!("no constraints, {} keywords", intent.constraints.keywords.len())
		} else {
			let applied: Vec<String> =
				intent.applied.iter().map(|(key, value)| format!("{key}={value}")).collect();

			format!("{}, {} keywords", applied.join(", "), intent.constraints.keywords.len())
		};

		StageUpdate {
			constraints: Some(intent.constraints),
			applied_constraints: Some(intent.applied),
			..Default::default()
		}
		.traced(Stage::Intent, started, notes)
	}

	async fn retrieve(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let query = state.sanitized_query.as_str();
		let embedding = self
			.providers
			.embedding
			.embed(&self.cfg.catalog, &[query.to_string()])
			.await
			.and_then(|vectors| {
				vectors.into_iter().next().ok_or_else(|| {
					color_eyre::eyre::eyre!("Embedding provider returned no query vector.")
				})
			});
		let outcome = retrieve::retrieve(
			self.index.as_ref(),
			embedding,
			query,
			&state.constraints,
			&self.cfg.retrieval,
		);
		let notes = outcome.note();

		if outcome.path.is_degraded() {
			tracing::warn!(
				request_id = %state.request_id,
				path = %outcome.path,
				candidates = outcome.candidates.len(),
				"Retrieval degraded."
			);
		}

		StageUpdate {
			candidates: Some(outcome.candidates),
			retrieval_path: Some(outcome.path),
			..Default::default()
		}
		.traced(Stage::Retrieve, started, notes)
	}

	async fn rerank(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let model = self.model.get().await;
		let outcome = rerank::rerank(
			model.as_deref(),
			&state.sanitized_query,
			state.candidates.clone(),
			&state.constraints,
			state.personalized,
			&self.cfg.rerank,
		)
		.await;
		let notes = outcome.note();

		StageUpdate {
			reranked: Some(outcome.candidates),
			rerank_timed_out: Some(outcome.timed_out),
			..Default::default()
		}
		.traced(Stage::Rerank, started, notes)
	}

	fn rank(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let ranked = rank::rank(state.reranked.clone(), &state.constraints, &self.cfg.ranking);
		let mode = state.constraints.sort.map(|sort| sort.as_str()).unwrap_or("balanced");
		let weights = Weights::for_mode(state.constraints.sort);
		let notes = format!(
			"ranked {} → top {} ({mode}, rerank weight {:.2})",
			state.reranked.len(),
			ranked.len(),
			weights.rerank
		);

		StageUpdate { ranked: Some(ranked), ..Default::default() }
			.traced(Stage::Rank, started, notes)
	}

	async fn eligibility(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let budget = self.spending_power(&state.user_id).await;
		let (ranked, capped) = eligibility::adjust(state.ranked.clone(), budget);
		let notes = format!(
			"preview applied to {} items, {capped} capped above spending power",
			ranked.len()
		);

		StageUpdate { ranked: Some(ranked), ..Default::default() }
			.traced(Stage::Eligibility, started, notes)
	}

	fn explain(&self, state: &PipelineState) -> StageUpdate {
		let started = Instant::now();
		let mut ranked = state.ranked.clone();
		let summary = explain::explain(&mut ranked, &state.constraints);
		let notes = format!("{} reasons, summary len={}", ranked.len(), summary.chars().count());

		StageUpdate { ranked: Some(ranked), summary: Some(summary), ..Default::default() }
			.traced(Stage::Explain, started, notes)
	}
}

fn default_personalized() -> bool {
	true
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_only_overwrites_set_fields() {
		let mut state = PipelineState::new(SearchRequest::new("laptop"));

		state.merge(StageUpdate {
			sanitized_query: Some("laptop".to_string()),
			trace: vec![TraceStep {
				step: "ingress".to_string(),
				elapsed_ms: 0.1,
				notes: String::new(),
			}],
			..Default::default()
		});
		state.merge(StageUpdate { summary: Some("done".to_string()), ..Default::default() });

		assert_eq!(state.sanitized_query, "laptop");
		assert_eq!(state.summary, "done");
		assert_eq!(state.trace.len(), 1);
		assert!(state.rejection.is_none());
	}

	#[test]
	fn blank_user_id_falls_back_to_demo_user() {
		let req = SearchRequest {
			query: "laptop".to_string(),
			user_id: Some("  ".to_string()),
			personalized: false,
			refine: None,
		};

		assert_eq!(PipelineState::new(req).user_id, DEFAULT_USER_ID);
	}

	#[test]
	fn request_defaults_to_personalized() {
		let req: SearchRequest =
			serde_json::from_str(r#"{"query": "laptop"}"#).expect("Failed to decode request.");

		assert!(req.personalized);
		assert!(req.user_id.is_none());
	}
}
