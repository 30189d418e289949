use ofr_domain::EligibilityTier;

use crate::{Candidate, index::cmp_score_desc};

const HIGH_RATIO: f64 = 0.5;
const MED_RATIO: f64 = 0.9;
const OVER_BUDGET_PENALTY: f64 = 0.3;

pub fn tier_for(total_price: f64, budget: f64) -> EligibilityTier {
	if budget <= 0.0 {
		return EligibilityTier::Low;
	}
	if total_price <= budget * HIGH_RATIO {
		EligibilityTier::High
	} else if total_price <= budget * MED_RATIO {
		EligibilityTier::Med
	} else {
		EligibilityTier::Low
	}
}

pub fn tier_delta(tier: EligibilityTier) -> f64 {
	match tier {
		EligibilityTier::High => 0.1,
		EligibilityTier::Med => 0.0,
		EligibilityTier::Low => -0.05,
	}
}

/// Re-tiers ranked candidates against `budget`, adjusts their scores and re-sorts.
///
/// Returns the candidates and how many were capped for exceeding the budget.
pub fn adjust(mut ranked: Vec<Candidate>, budget: f64) -> (Vec<Candidate>, usize) {
	let mut capped = 0;

	for candidate in ranked.iter_mut() {
		let tier = tier_for(candidate.item.total_price, budget);
		let mut score = candidate.rank.unwrap_or(0.0) + tier_delta(tier);

		if candidate.item.total_price > budget {
			score -= OVER_BUDGET_PENALTY;
			candidate.capped = true;
			capped += 1;
		}

		candidate.eligibility = Some(tier);
		candidate.rank = Some(score.max(0.0));
	}

	ranked.sort_by(|a, b| cmp_score_desc(a.rank.unwrap_or(0.0), b.rank.unwrap_or(0.0)));

	(ranked, capped)
}

#[cfg(test)]
mod tests {
	use ofr_domain::{Category, Item};

	use super::*;

	fn ranked(id: &str, total: f64, score: f64) -> Candidate {
		let mut candidate = Candidate::from_item(&Item {
			id: id.to_string(),
			merchant: "Store".to_string(),
			product: "Thing".to_string(),
			category: Category::Home,
			total_price: total,
			term_months: 12,
			apr: 0.0,
			monthly_payment: total / 12.0,
			eligibility_hint: Some(EligibilityTier::High),
			disclosure: None,
			embedding: Vec::new(),
			tokens: Vec::new(),
		});

		candidate.rank = Some(score);

		candidate
	}

	#[test]
	fn tiers_follow_budget_ratio() {
		assert_eq!(tier_for(600.0, 1_200.0), EligibilityTier::High);
		assert_eq!(tier_for(1_000.0, 1_200.0), EligibilityTier::Med);
		assert_eq!(tier_for(1_100.0, 1_200.0), EligibilityTier::Low);
		assert_eq!(tier_for(1.0, 0.0), EligibilityTier::Low);
	}

	#[test]
	fn over_budget_items_are_capped_and_resorted() {
		let (adjusted, capped) =
			adjust(vec![ranked("big", 2_000.0, 0.8), ranked("small", 300.0, 0.6)], 1_200.0);

		assert_eq!(capped, 1);
		assert_eq!(adjusted[0].id(), "small");
		assert!((adjusted[0].rank.unwrap_or_default() - 0.7).abs() < 1e-9);
		assert!((adjusted[1].rank.unwrap_or_default() - 0.45).abs() < 1e-9);
		assert!(adjusted[1].capped);
		assert_eq!(adjusted[1].eligibility, Some(EligibilityTier::Low));
	}

	#[test]
	fn over_budget_scores_never_rise_and_stay_non_negative() {
		let (adjusted, _) =
			adjust(vec![ranked("a", 5_000.0, 0.1), ranked("b", 1_500.0, 0.9)], 1_000.0);

		for candidate in &adjusted {
			let before = if candidate.id() == "a" { 0.1 } else { 0.9 };
			let after = candidate.rank.unwrap_or(f64::NAN);

			assert!(after <= before);
			assert!(after >= 0.0);
		}
	}

	#[test]
	fn zero_budget_marks_everything_low() {
		let (adjusted, capped) = adjust(vec![ranked("a", 10.0, 0.5)], 0.0);

		assert_eq!(capped, 1);
		assert_eq!(adjusted[0].eligibility, Some(EligibilityTier::Low));
	}
}
