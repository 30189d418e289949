use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::OnceCell, time::Instant};

use ofr_config::ProviderConfig;
use ofr_domain::{ConstraintSet, tokenize};

use crate::{Candidate, RelevanceModel, RelevanceModelLoader, index::cmp_score_desc};

const OVERLAP_WEIGHT: f64 = 0.3;
const SIMILARITY_WEIGHT: f64 = 0.7;
const DEFAULT_SIMILARITY: f64 = 0.5;

/// Lazily loaded relevance model. Loading runs at most once per handle; a failed load is
/// remembered and every later request uses the deterministic scorer.
pub struct ModelHandle {
	cfg: Option<ProviderConfig>,
	loader: Arc<dyn RelevanceModelLoader>,
	cell: OnceCell<Option<Arc<dyn RelevanceModel>>>,
}
impl ModelHandle {
	pub fn new(cfg: Option<ProviderConfig>, loader: Arc<dyn RelevanceModelLoader>) -> Self {
		Self { cfg, loader, cell: OnceCell::new() }
	}

	pub fn is_configured(&self) -> bool {
		self.cfg.is_some()
	}

	pub async fn get(&self) -> Option<Arc<dyn RelevanceModel>> {
		let cfg = self.cfg.as_ref()?;

		self.cell
			.get_or_init(|| async {
				match self.loader.load(cfg).await {
					Ok(model) => {
						tracing::info!(
							provider_id = %cfg.provider_id,
							model = %cfg.model,
							"Relevance model loaded."
						);

						Some(model)
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							model = %cfg.model,
							"Relevance model failed to load. Using deterministic reranking."
						);

						None
					},
				}
			})
			.await
			.clone()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
	Model,
	Fallback,
}

impl fmt::Display for Scorer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Model => f.write_str("model"),
			Self::Fallback => f.write_str("fallback"),
		}
	}
}

#[derive(Debug)]
pub struct RerankOutcome {
	pub candidates: Vec<Candidate>,
	pub scorer: Scorer,
	pub head: usize,
	pub elapsed_ms: f64,
	pub timed_out: bool,
}
impl RerankOutcome {
	pub fn note(&self) -> String {
		let mut note =
			format!("{} scored {} of {} candidates", self.scorer, self.head, self.candidates.len());

		if self.timed_out {
			note.push_str(&format!(" (soft timeout exceeded at {:.1} ms)", self.elapsed_ms));
		}

		note
	}
}

/// Rescores the head of `candidates` and sorts it; the tail keeps its retrieval order.
pub async fn rerank(
	model: Option<&dyn RelevanceModel>,
	query: &str,
	mut candidates: Vec<Candidate>,
	constraints: &ConstraintSet,
	personalized: bool,
	cfg: &ofr_config::Rerank,
) -> RerankOutcome {
	let head_len = candidates.len().min(cfg.max_candidates as usize);
	let tail = candidates.split_off(head_len);
	let mut head = candidates;
	let started = Instant::now();
	let mut scorer = Scorer::Fallback;

	if let Some(model) = model
		&& !head.is_empty()
	{
		let docs: Vec<String> = head.iter().map(|c| c.item.model_document()).collect();

		match model.score(query, &docs).await {
			Ok(scores) if scores.len() == head.len() && scores.iter().all(|s| s.is_finite()) => {
				for (candidate, score) in head.iter_mut().zip(scores) {
					candidate.rerank = Some(score as f64);
				}

				scorer = Scorer::Model;
			},
			Ok(scores) => {
				tracing::warn!(
					expected = head.len(),
					returned = scores.len(),
					"Relevance model returned unusable scores. Using deterministic reranking."
				);
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Relevance model scoring failed. Using deterministic reranking."
				);
			},
		}
	}

	if scorer == Scorer::Fallback {
		for candidate in head.iter_mut() {
			candidate.rerank = Some(fallback_score(query, candidate));
		}
	}

	let elapsed = started.elapsed();
	let timed_out = elapsed > Duration::from_millis(cfg.timeout_ms);

	if timed_out {
		tracing::warn!(
			elapsed_ms = elapsed.as_millis() as u64,
			timeout_ms = cfg.timeout_ms,
			"Rerank exceeded its soft time budget."
		);
	}
	if personalized {
		for candidate in head.iter_mut() {
			let boost = personal_boost(candidate, constraints, cfg);

			candidate.rerank = Some(candidate.rerank.unwrap_or(0.0) + boost);
		}
	}

	head.sort_by(|a, b| cmp_score_desc(a.rerank.unwrap_or(0.0), b.rerank.unwrap_or(0.0)));

	let head_count = head.len();

	head.extend(tail);

	RerankOutcome {
		candidates: head,
		scorer,
		head: head_count,
		elapsed_ms: elapsed.as_secs_f64() * 1_000.0,
		timed_out,
	}
}

/// Keyword overlap between the query and the item's category, merchant and product words,
/// blended with retrieval similarity.
pub fn fallback_score(query: &str, candidate: &Candidate) -> f64 {
	let item = &candidate.item;
	let query_terms: HashSet<String> = tokenize::whitespace_terms(query).into_iter().collect();
	let item_terms: HashSet<String> = tokenize::whitespace_terms(&format!(
		"{} {} {}",
		item.category, item.merchant, item.product
	))
	.into_iter()
	.collect();
	let overlap = query_terms.intersection(&item_terms).count() as f64;

	let similarity = candidate.similarity.unwrap_or(DEFAULT_SIMILARITY);

	overlap * OVERLAP_WEIGHT + similarity * SIMILARITY_WEIGHT
}

pub fn personal_boost(
	candidate: &Candidate,
	constraints: &ConstraintSet,
	cfg: &ofr_config::Rerank,
) -> f64 {
	let item = &candidate.item;
	let mut boost = 0.0;

	if constraints.category == Some(item.category) {
		boost += cfg.category_boost;
	}

	let item_tokens: HashSet<String> =
		tokenize::tokenize(&format!("{} {}", item.merchant, item.product))
			.into_iter()
			.filter(|token| token.chars().count() > 1)
			.collect();
	let keywords: HashSet<String> =
		constraints.keywords.iter().map(|keyword| keyword.to_lowercase()).collect();

	for keyword in &keywords {
		if item_tokens.contains(keyword) {
			boost += cfg.keyword_boost;
		}
	}

	boost.min(cfg.max_boost)
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use color_eyre::eyre;

	use ofr_domain::{Category, Item};

	use super::*;
	use crate::BoxFuture;

	struct FixedModel {
		scores: Vec<f32>,
		delay: Duration,
	}
	impl RelevanceModel for FixedModel {
		fn score<'a>(
			&'a self,
			_query: &'a str,
			_docs: &'a [String],
		) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
			Box::pin(async move {
				tokio::time::sleep(self.delay).await;

				Ok(self.scores.clone())
			})
		}
	}

	struct CountingLoader {
		loads: AtomicUsize,
		fail: bool,
	}
	impl RelevanceModelLoader for CountingLoader {
		fn load<'a>(
			&'a self,
			_cfg: &'a ProviderConfig,
		) -> BoxFuture<'a, color_eyre::Result<Arc<dyn RelevanceModel>>> {
			self.loads.fetch_add(1, Ordering::SeqCst);

			let fail = self.fail;

			Box::pin(async move {
				if fail {
					return Err(eyre::eyre!("model weights missing"));
				}

				let model: Arc<dyn RelevanceModel> =
					Arc::new(FixedModel { scores: Vec::new(), delay: Duration::ZERO });

				Ok(model)
			})
		}
	}

	fn provider_config() -> ProviderConfig {
		ProviderConfig {
			provider_id: "local".to_string(),
			api_base: "http://127.0.0.1:9000".to_string(),
			api_key: String::new(),
			path: "/v1/rerank".to_string(),
			model: "bge-reranker-base".to_string(),
			timeout_ms: 1_000,
			default_headers: Default::default(),
		}
	}

	fn candidate(id: &str, merchant: &str, product: &str, category: Category) -> Candidate {
		Candidate::from_item(&Item {
			id: id.to_string(),
			merchant: merchant.to_string(),
			product: product.to_string(),
			category,
			total_price: 500.0,
			term_months: 12,
			apr: 0.0,
			monthly_payment: 41.67,
			eligibility_hint: None,
			disclosure: None,
			embedding: Vec::new(),
			tokens: Vec::new(),
		})
	}

	fn ids(candidates: &[Candidate]) -> Vec<&str> {
		candidates.iter().map(|c| c.id()).collect()
	}

	#[test]
	fn fallback_blends_overlap_and_similarity() {
		let mut laptop = candidate("a", "Best Buy", "Dell XPS 14 Laptop", Category::Electronics);

		laptop.similarity = Some(0.2);

		let score = fallback_score("dell laptop", &laptop);

		assert!((score - (2.0 * 0.3 + 0.2 * 0.7)).abs() < 1e-12);

		let sofa = candidate("b", "Wayfair", "Sectional Sofa Set", Category::Home);

		assert!((fallback_score("dell laptop", &sofa) - 0.35).abs() < 1e-12);
	}

	#[test]
	fn fallback_is_deterministic() {
		let laptop = candidate("a", "Best Buy", "Dell XPS 14 Laptop", Category::Electronics);

		assert_eq!(fallback_score("xps laptop", &laptop), fallback_score("xps laptop", &laptop));
	}

	#[test]
	fn personal_boost_is_capped() {
		let cfg = ofr_config::Rerank::default();
		let laptop = candidate("a", "Best Buy", "Dell XPS 14 Laptop", Category::Electronics);
		let constraints = ConstraintSet {
			category: Some(Category::Electronics),
			keywords: vec!["dell".to_string(), "xps".to_string(), "laptop".to_string()],
			..Default::default()
		};

		assert!((personal_boost(&laptop, &constraints, &cfg) - 0.3).abs() < 1e-12);

		let constraints =
			ConstraintSet { keywords: vec!["dell".to_string()], ..Default::default() };

		assert!((personal_boost(&laptop, &constraints, &cfg) - 0.1).abs() < 1e-12);
	}

	#[tokio::test]
	async fn tail_keeps_retrieval_order() {
		let cfg = ofr_config::Rerank { max_candidates: 2, ..Default::default() };
		let candidates = vec![
			candidate("a", "Wayfair", "Sofa", Category::Home),
			candidate("b", "Best Buy", "Laptop", Category::Electronics),
			candidate("c", "Nike", "Shoe", Category::Sneakers),
			candidate("d", "Apple", "Laptop", Category::Electronics),
		];
		let outcome =
			rerank(None, "laptop", candidates, &ConstraintSet::default(), false, &cfg).await;

		assert_eq!(ids(&outcome.candidates), vec!["b", "a", "c", "d"]);
		assert_eq!(outcome.scorer, Scorer::Fallback);
		assert_eq!(outcome.head, 2);
		assert!(outcome.candidates[2].rerank.is_none());
	}

	#[tokio::test]
	async fn model_scores_order_the_head() {
		let model = FixedModel { scores: vec![0.1, 0.9], delay: Duration::ZERO };
		let candidates = vec![
			candidate("a", "Wayfair", "Sofa", Category::Home),
			candidate("b", "Best Buy", "Laptop", Category::Electronics),
		];
		let outcome = rerank(
			Some(&model),
			"sofa",
			candidates,
			&ConstraintSet::default(),
			false,
			&ofr_config::Rerank::default(),
		)
		.await;

		assert_eq!(outcome.scorer, Scorer::Model);
		assert_eq!(ids(&outcome.candidates), vec!["b", "a"]);
		assert!(!outcome.timed_out);
	}

	#[tokio::test]
	async fn mismatched_score_count_falls_back() {
		let model = FixedModel { scores: vec![0.9], delay: Duration::ZERO };
		let candidates = vec![
			candidate("a", "Wayfair", "Sofa", Category::Home),
			candidate("b", "Best Buy", "Laptop", Category::Electronics),
		];
		let outcome = rerank(
			Some(&model),
			"laptop",
			candidates,
			&ConstraintSet::default(),
			false,
			&ofr_config::Rerank::default(),
		)
		.await;

		assert_eq!(outcome.scorer, Scorer::Fallback);
		assert_eq!(ids(&outcome.candidates), vec!["b", "a"]);
	}

	#[tokio::test]
	async fn slow_model_is_flagged_but_used() {
		let cfg = ofr_config::Rerank { timeout_ms: 1, ..Default::default() };
		let model = FixedModel { scores: vec![0.4], delay: Duration::from_millis(20) };
		let candidates = vec![candidate("a", "Wayfair", "Sofa", Category::Home)];
		let outcome =
			rerank(Some(&model), "sofa", candidates, &ConstraintSet::default(), false, &cfg).await;

		assert!(outcome.timed_out);
		assert_eq!(outcome.scorer, Scorer::Model);
		assert!(outcome.note().contains("soft timeout exceeded"));
	}

	#[tokio::test]
	async fn failed_load_is_attempted_once() {
		let loader = Arc::new(CountingLoader { loads: AtomicUsize::new(0), fail: true });
		let handle = ModelHandle::new(Some(provider_config()), loader.clone());

		assert!(handle.get().await.is_none());
		assert!(handle.get().await.is_none());
		assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn unconfigured_handle_never_loads() {
		let loader = Arc::new(CountingLoader { loads: AtomicUsize::new(0), fail: false });
		let handle = ModelHandle::new(None, loader.clone());

		assert!(!handle.is_configured());
		assert!(handle.get().await.is_none());
		assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn successful_load_is_shared() {
		let loader = Arc::new(CountingLoader { loads: AtomicUsize::new(0), fail: false });
		let handle = ModelHandle::new(Some(provider_config()), loader.clone());

		assert!(handle.get().await.is_some());
		assert!(handle.get().await.is_some());
		assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
	}
}
