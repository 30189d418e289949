use serde::Serialize;

use ofr_domain::{ConstraintSet, EligibilityTier};

use crate::Candidate;

pub const DISCLAIMERS: [&str; 2] = [
	"Estimates shown. Terms may vary at checkout.",
	"Checking eligibility won't affect your credit score.",
];

const MAX_REASONS: usize = 2;
const IMPACT_ITEMS: usize = 5;
const IMPACT_LABEL_CHARS: usize = 8;

/// One bar of the monthly payment comparison across the final results.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyImpact {
	pub label: String,
	pub value: f64,
}

/// Writes a reason into every candidate and returns the summary sentence.
pub fn explain(candidates: &mut [Candidate], constraints: &ConstraintSet) -> String {
	for (position, candidate) in candidates.iter_mut().enumerate() {
		candidate.reason = Some(item_reason(candidate, position, constraints));
	}

	summary(candidates, constraints)
}

pub fn item_reason(candidate: &Candidate, position: usize, constraints: &ConstraintSet) -> String {
	let item = &candidate.item;
	let high = candidate.eligibility == Some(EligibilityTier::High);
	let mut reasons: Vec<String> = Vec::new();

	if position == 0 {
		reasons.push("Recommended based on your spending profile.".to_string());
	} else if item.apr == 0.0 {
		reasons.push("0% APR keeps your total cost low.".to_string());
	} else if high {
		reasons.push("High eligibility based on your payment history.".to_string());
	}

	if let Some(max_monthly) = constraints.max_monthly
		&& item.monthly_payment <= max_monthly
	{
		reasons.push(format!("Fits your ${max_monthly:.0}/mo target."));
	}
	if high && position > 0 {
		reasons.push("Strong approval likelihood.".to_string());
	}
	if reasons.is_empty() {
		reasons.push("Matches your search criteria.".to_string());
	}

	reasons.truncate(MAX_REASONS);

	reasons.join(" ")
}

pub fn summary(candidates: &[Candidate], constraints: &ConstraintSet) -> String {
	let budget = match (constraints.max_monthly, constraints.max_price) {
		(Some(max_monthly), _) => format!("fit under ${max_monthly:.0}/mo"),
		(None, Some(max_price)) => format!("stay under ${max_price:.0}"),
		(None, None) => "fit your budget".to_string(),
	};
	let rate = if constraints.zero_rate_only { "offer 0% APR" } else { "minimize interest" };
	let mut summary =
		format!("We prioritized options that {budget}, {rate}, match your eligibility.");

	if let Some(top) = candidates.first() {
		let item = &top.item;
		let tail = if item.apr == 0.0 { " with no interest." } else { "." };

		summary.push_str(&format!(
			" Top pick: {} at ${:.0}/mo{tail}",
			item.product, item.monthly_payment
		));
	}

	summary
}

/// Merchant label (first eight characters) and monthly payment for the top five results.
pub fn monthly_impact(candidates: &[Candidate]) -> Vec<MonthlyImpact> {
	candidates
		.iter()
		.take(IMPACT_ITEMS)
		.map(|candidate| MonthlyImpact {
			label: candidate.item.merchant.chars().take(IMPACT_LABEL_CHARS).collect(),
			value: candidate.item.monthly_payment,
		})
		.collect()
}
