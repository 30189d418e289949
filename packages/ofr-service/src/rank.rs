use ofr_domain::{ConstraintSet, EligibilityTier, SortMode};

use crate::{Candidate, index::cmp_score_desc};

const ABSENT_CONFIDENCE: f64 = 0.5;
const ABSENT_RERANK: f64 = 0.5;
const TERM_HORIZON_MONTHS: f64 = 24.0;

/// Component weights for one sort mode. Every field sums into the composite score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weights {
	pub affordability: f64,
	pub rate: f64,
	pub confidence: f64,
	pub total_cost: f64,
	pub rerank: f64,
	pub term: f64,
}
impl Weights {
	pub fn for_mode(sort: Option<SortMode>) -> Self {
		match sort {
			Some(SortMode::LowestMonthly) => Self {
				affordability: 0.5,
				rate: 0.15,
				confidence: 0.15,
				total_cost: 0.0,
				rerank: 0.2,
				term: 0.0,
			},
			Some(SortMode::LowestTotal) => Self {
				affordability: 0.0,
				rate: 0.15,
				confidence: 0.15,
				total_cost: 0.5,
				rerank: 0.2,
				term: 0.0,
			},
			Some(SortMode::ShortestTerm) => Self {
				affordability: 0.2,
				rate: 0.0,
				confidence: 0.2,
				total_cost: 0.0,
				rerank: 0.2,
				term: 0.4,
			},
			None => Self {
				affordability: 0.3,
				rate: 0.2,
				confidence: 0.2,
				total_cost: 0.0,
				rerank: 0.3,
				term: 0.0,
			},
		}
	}
}

pub fn confidence_score(tier: Option<EligibilityTier>) -> f64 {
	match tier {
		Some(EligibilityTier::High) => 1.0,
		Some(EligibilityTier::Med) => 0.6,
		Some(EligibilityTier::Low) => 0.3,
		None => ABSENT_CONFIDENCE,
	}
}

/// Scores every candidate, sorts descending (stable) and keeps the top `max_results`.
pub fn rank(
	mut candidates: Vec<Candidate>,
	constraints: &ConstraintSet,
	cfg: &ofr_config::Ranking,
) -> Vec<Candidate> {
	if candidates.is_empty() {
		return candidates;
	}

	let max_monthly = candidates.iter().map(|c| c.item.monthly_payment).fold(0.0, f64::max);
	let max_total = candidates.iter().map(|c| c.item.total_price).fold(0.0, f64::max);
	let max_rate = candidates.iter().map(|c| c.item.apr).fold(0.0, f64::max);
	let weights = Weights::for_mode(constraints.sort);
	let enforce = constraints.has_hard_constraints();

	for candidate in candidates.iter_mut() {
		let item = &candidate.item;
		let affordability = normalized(item.monthly_payment, max_monthly);
		let rate = normalized(item.apr, max_rate);
		let total_cost = normalized(item.total_price, max_total);
		let confidence = confidence_score(candidate.eligibility);
		let rerank = match candidate.rerank {
			Some(score) if score.is_finite() => score.max(0.0),
			_ => ABSENT_RERANK,
		};
		let term = (1.0 - item.term_months as f64 / TERM_HORIZON_MONTHS).clamp(0.0, 1.0);
		let mut score = affordability * weights.affordability
			+ rate * weights.rate
			+ confidence * weights.confidence
			+ total_cost * weights.total_cost
			+ rerank * weights.rerank
			+ term * weights.term;

		if enforce && !constraints.admits(item) {
			score = (score - cfg.constraint_penalty).max(0.0);
		}

		candidate.rank = Some(score);
	}

	candidates.sort_by(|a, b| cmp_score_desc(a.rank.unwrap_or(0.0), b.rank.unwrap_or(0.0)));
	candidates.truncate(cfg.max_results.min(ofr_config::MAX_RESULTS_CAP) as usize);

	candidates
}

// 1 - value / max, with a zero maximum scoring every candidate 1.0.
fn normalized(value: f64, max: f64) -> f64 {
	if max <= 0.0 {
		return 1.0;
	}

	(1.0 - value / max).clamp(0.0, 1.0)
}
