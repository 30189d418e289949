use std::fs;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use ofr_config::Profile;

use crate::{Error, OfferService, Result};

const SEED_HISTORY: &str = include_str!("../data/seed_profile.json");

/// Budget figure and account standing for one user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserProfile {
	pub user_id: String,
	pub name: String,
	pub spending_power: f64,
	pub active_plans_count: u32,
	pub payment_status: String,
	pub account_health: String,
}
impl UserProfile {
	pub fn from_config(cfg: &Profile, user_id: &str) -> Self {
		Self {
			user_id: user_id.to_string(),
			name: cfg.name.clone(),
			spending_power: cfg.spending_power,
			active_plans_count: cfg.active_plans_count,
			payment_status: cfg.payment_status.clone(),
			account_health: cfg.account_health.clone(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivePlan {
	pub id: String,
	pub merchant: String,
	pub product: String,
	pub remaining_balance: f64,
	pub monthly_payment: f64,
	pub next_payment_date: Date,
	pub total_paid: f64,
	pub total_amount: f64,
	pub term_months: u32,
	pub apr: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
	pub id: String,
	pub text: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub sparkline: Option<Vec<f64>>,
}

/// Payment-history aggregates as stored: the eligibility note, open plans and insights.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentHistory {
	pub explanation: String,
	#[serde(with = "time::serde::rfc3339")]
	pub last_refreshed: OffsetDateTime,
	#[serde(default)]
	pub plans: Vec<ActivePlan>,
	#[serde(default)]
	pub insights: Vec<Insight>,
}
impl PaymentHistory {
	/// Reads the history file named by the config, or the bundled demo history.
	pub fn load(cfg: &Profile) -> Result<Self> {
		match cfg.history_path.as_ref() {
			Some(path) => {
				let raw = fs::read_to_string(path).map_err(|err| Error::Provider {
					message: format!("Failed to read payment history at {path:?}: {err}"),
				})?;

				Self::parse(&raw)
			},
			None => Self::parse(SEED_HISTORY),
		}
	}

	pub fn parse(raw: &str) -> Result<Self> {
		serde_json::from_str(raw).map_err(|err| Error::Provider {
			message: format!("Failed to parse payment history: {err}"),
		})
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EligibilitySummary {
	pub spending_power: f64,
	pub explanation: String,
	#[serde(with = "time::serde::rfc3339")]
	pub last_refreshed: OffsetDateTime,
}

/// Everything the profile provider knows about one user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileSummary {
	pub user: UserProfile,
	pub eligibility: EligibilitySummary,
	pub plans: Vec<ActivePlan>,
	pub insights: Vec<Insight>,
}
impl ProfileSummary {
	pub fn new(user: UserProfile, history: PaymentHistory) -> Self {
		let eligibility = EligibilitySummary {
			spending_power: user.spending_power,
			explanation: history.explanation,
			last_refreshed: history.last_refreshed,
		};

		Self { user, eligibility, plans: history.plans, insights: history.insights }
	}

	pub fn from_config(cfg: &Profile, user_id: &str) -> Result<Self> {
		Ok(Self::new(UserProfile::from_config(cfg, user_id), PaymentHistory::load(cfg)?))
	}

	/// Overrides the budget in both the user record and the eligibility block.
	pub fn with_spending_power(mut self, spending_power: f64) -> Self {
		self.user.spending_power = spending_power;
		self.eligibility.spending_power = spending_power;

		self
	}

	pub fn monthly_obligations(&self) -> f64 {
		self.plans.iter().map(|plan| plan.monthly_payment).sum()
	}
}

impl OfferService {
	pub async fn profile_summary(&self, user_id: &str) -> Result<ProfileSummary> {
		let summary = self.providers.profile.profile(&self.cfg.profile, user_id).await?;

		tracing::debug!(
			user_id,
			plans = summary.plans.len(),
			monthly_obligations = summary.monthly_obligations(),
			"Profile summary loaded."
		);

		Ok(summary)
	}

	/// Budget used by the eligibility stage. Provider failures fall back to the configured figure.
	pub(crate) async fn spending_power(&self, user_id: &str) -> f64 {
		match self.providers.profile.profile(&self.cfg.profile, user_id).await {
			Ok(summary) => summary.eligibility.spending_power,
			Err(err) => {
				tracing::warn!(
					error = %err,
					user_id,
					"Profile lookup failed. Using the configured spending power."
				);

				self.cfg.profile.spending_power
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime};

	use super::*;

	#[test]
	fn profile_mirrors_config() {
		let profile = UserProfile::from_config(&Profile::default(), "demo-user");

		assert_eq!(profile.user_id, "demo-user");
		assert_eq!(profile.spending_power, 1_200.0);
		assert_eq!(profile.active_plans_count, 3);
	}

	#[test]
	fn bundled_history_carries_plans_and_eligibility() {
		let summary = ProfileSummary::from_config(&Profile::default(), "demo-user")
			.expect("Failed to load bundled history.");

		assert_eq!(summary.eligibility.spending_power, 1_200.0);
		assert_eq!(summary.eligibility.last_refreshed, datetime!(2026-02-25 10:30:00 UTC));
		assert!(summary.eligibility.explanation.contains("Final approval happens at checkout."));
		assert_eq!(summary.plans.len(), 3);
		assert_eq!(summary.plans[0].next_payment_date, date!(2026 - 03 - 01));
		assert_eq!(summary.insights.len(), 3);
		assert!(summary.insights[1].sparkline.is_none());
		assert!((summary.monthly_obligations() - 295.43).abs() < 1e-9);
	}

	#[test]
	fn spending_power_override_updates_both_blocks() {
		let summary = ProfileSummary::from_config(&Profile::default(), "u-1")
			.expect("Failed to load bundled history.")
			.with_spending_power(800.0);

		assert_eq!(summary.user.spending_power, 800.0);
		assert_eq!(summary.eligibility.spending_power, 800.0);
	}

	#[test]
	fn missing_history_file_is_a_provider_error() {
		let cfg = Profile {
			history_path: Some("/nonexistent/ofr/history.json".into()),
			..Default::default()
		};
		let err = ProfileSummary::from_config(&cfg, "u-1").expect_err("Expected a read error.");

		assert!(matches!(err, Error::Provider { .. }));
	}

	#[test]
	fn summary_serializes_insight_kind_as_type() {
		let summary = ProfileSummary::from_config(&Profile::default(), "u-1")
			.expect("Failed to load bundled history.");
		let json = serde_json::to_value(&summary).expect("Failed to serialize summary.");

		assert_eq!(json["insights"][0]["type"], "saving");
		assert_eq!(json["plans"][2]["next_payment_date"], "2026-03-10");
		assert_eq!(json["eligibility"]["last_refreshed"], "2026-02-25T10:30:00Z");
	}
}
