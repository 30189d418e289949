use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	Electronics,
	Travel,
	Sneakers,
	Home,
	Fitness,
	Gaming,
	Fashion,
	Appliances,
}
impl Category {
	pub const ALL: [Self; 8] = [
		Self::Electronics,
		Self::Travel,
		Self::Sneakers,
		Self::Home,
		Self::Fitness,
		Self::Gaming,
		Self::Fashion,
		Self::Appliances,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Electronics => "electronics",
			Self::Travel => "travel",
			Self::Sneakers => "sneakers",
			Self::Home => "home",
			Self::Fitness => "fitness",
			Self::Gaming => "gaming",
			Self::Fashion => "fashion",
			Self::Appliances => "appliances",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		let needle = raw.trim();

		Self::ALL.into_iter().find(|category| category.as_str().eq_ignore_ascii_case(needle))
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Approval-confidence tier for an offer against a budget figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityTier {
	High,
	Med,
	Low,
}
impl EligibilityTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Med => "med",
			Self::Low => "low",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
	LowestMonthly,
	LowestTotal,
	ShortestTerm,
}
impl SortMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::LowestMonthly => "lowest_monthly",
			Self::LowestTotal => "lowest_total",
			Self::ShortestTerm => "shortest_term",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"lowest_monthly" => Some(Self::LowestMonthly),
			"lowest_total" => Some(Self::LowestTotal),
			"shortest_term" => Some(Self::ShortestTerm),
			_ => None,
		}
	}
}

/// A catalog offer. Owned by the catalog index and never mutated after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
	pub id: String,
	pub merchant: String,
	pub product: String,
	pub category: Category,
	pub total_price: f64,
	pub term_months: u32,
	/// Annual financing rate in percent.
	pub apr: f64,
	pub monthly_payment: f64,
	#[serde(default)]
	pub eligibility_hint: Option<EligibilityTier>,
	#[serde(default)]
	pub disclosure: Option<String>,
	/// Dense embedding. Empty in catalog files that leave embedding to the index build.
	#[serde(default, skip_serializing)]
	pub embedding: Vec<f32>,
	/// Lexical tokens of merchant, product and category, filled by the index build.
	#[serde(skip)]
	pub tokens: Vec<String>,
}
impl Item {
	pub fn lexical_text(&self) -> String {
		format!("{} {} {}", self.merchant, self.product, self.category)
	}

	pub fn embedding_text(&self) -> String {
		format!(
			"{} {} {} ${} {}% APR {} months",
			self.category,
			self.merchant,
			self.product,
			self.total_price,
			self.apr,
			self.term_months
		)
	}

	/// Passage text sent to a relevance model alongside the query.
	pub fn model_document(&self) -> String {
		format!(
			"{} {} ${} {}% APR {} months {}",
			self.merchant,
			self.product,
			self.total_price,
			self.apr,
			self.term_months,
			self.category
		)
	}
}

/// Structured constraints extracted from a query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
	pub max_price: Option<f64>,
	pub max_monthly: Option<f64>,
	pub category: Option<Category>,
	pub zero_rate_only: bool,
	pub sort: Option<SortMode>,
	pub keywords: Vec<String>,
}
impl ConstraintSet {
	pub fn has_hard_constraints(&self) -> bool {
		self.max_price.is_some()
			|| self.max_monthly.is_some()
			|| self.category.is_some()
			|| self.zero_rate_only
	}

	pub fn category_allows(&self, item: &Item) -> bool {
		self.category.map(|category| item.category == category).unwrap_or(true)
	}

	pub fn price_allows(&self, item: &Item) -> bool {
		self.max_price.map(|max| item.total_price <= max).unwrap_or(true)
	}

	pub fn monthly_allows(&self, item: &Item) -> bool {
		self.max_monthly.map(|max| item.monthly_payment <= max).unwrap_or(true)
	}

	pub fn rate_allows(&self, item: &Item) -> bool {
		!self.zero_rate_only || item.apr == 0.0
	}

	/// True when the item satisfies every hard constraint.
	pub fn admits(&self, item: &Item) -> bool {
		self.category_allows(item)
			&& self.price_allows(item)
			&& self.monthly_allows(item)
			&& self.rate_allows(item)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(category: Category, total_price: f64, apr: f64, monthly_payment: f64) -> Item {
		Item {
			id: "offer-test".to_string(),
			merchant: "Best Buy".to_string(),
			product: "Dell XPS 14 Laptop".to_string(),
			category,
			total_price,
			term_months: 12,
			apr,
			monthly_payment,
			eligibility_hint: None,
			disclosure: None,
			embedding: Vec::new(),
			tokens: Vec::new(),
		}
	}

	#[test]
	fn category_parse_is_case_insensitive() {
		assert_eq!(Category::parse(" Electronics "), Some(Category::Electronics));
		assert_eq!(Category::parse("boats"), None);
	}

	#[test]
	fn model_document_renders_whole_prices_without_fraction() {
		let item = item(Category::Electronics, 899.0, 5.99, 74.92);

		assert_eq!(
			item.model_document(),
			"Best Buy Dell XPS 14 Laptop $899 5.99% APR 12 months electronics"
		);
	}

	#[test]
	fn empty_constraints_admit_everything() {
		let constraints = ConstraintSet::default();

		assert!(!constraints.has_hard_constraints());
		assert!(constraints.admits(&item(Category::Travel, 3_100.0, 12.99, 189.66)));
	}

	#[test]
	fn zero_rate_only_rejects_financed_items() {
		let constraints = ConstraintSet { zero_rate_only: true, ..Default::default() };

		assert!(constraints.admits(&item(Category::Home, 420.0, 0.0, 70.0)));
		assert!(!constraints.admits(&item(Category::Home, 1_200.0, 9.99, 105.49)));
	}
}
