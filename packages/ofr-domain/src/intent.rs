use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::offer::{Category, ConstraintSet, SortMode};

const CATEGORY_KEYWORDS: [(Category, &[&str]); 8] = [
	(
		Category::Electronics,
		&[
			"laptop", "phone", "tablet", "headphone", "tv", "computer", "kindle", "ipad", "macbook",
			"samsung", "sony", "dell", "asus", "oled",
		],
	),
	(
		Category::Travel,
		&[
			"trip",
			"travel",
			"vacation",
			"flight",
			"hotel",
			"beach",
			"ski",
			"resort",
			"cancun",
			"miami",
			"nyc",
			"costa rica",
			"denver",
		],
	),
	(
		Category::Sneakers,
		&["sneaker", "shoe", "jordan", "nike", "adidas", "new balance", "air max", "ultraboost"],
	),
	(
		Category::Home,
		&[
			"sofa",
			"couch",
			"furniture",
			"mattress",
			"desk",
			"shelf",
			"table",
			"vacuum",
			"home upgrade",
		],
	),
	(Category::Fitness, &["fitness", "gym", "peloton", "bike", "garmin", "watch", "workout"]),
	(Category::Gaming, &["gaming", "ps5", "playstation", "xbox", "steam deck", "razer", "game"]),
	(Category::Fashion, &["fashion", "parka", "coat", "jacket", "designer"]),
	(Category::Appliances, &["fridge", "washer", "dryer", "appliance", "coffee", "breville"]),
];
const STOPWORDS: [&str; 23] = [
	"a", "an", "the", "with", "and", "or", "for", "my", "me", "i", "under", "only", "just", "want",
	"need", "looking", "find", "get", "buy", "plan", "try", "cheaper", "options",
];

static UNDER_AMOUNT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"under\s*\$\s*([\d,]+)").expect("under-amount regex"));
static MONTHLY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*(?:/\s*mo|per\s*month|monthly)").expect("monthly-suffix regex")
});
static SLASH_SUFFIX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\s*/").expect("slash-suffix regex"));
static ZERO_RATE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"0\s*%\s*apr|zero\s*%?\s*apr|no\s*interest").expect("zero-rate regex")
});
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+").expect("word regex"));

/// Client-side refinements that take precedence over anything parsed from the query.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Refine {
	pub zero_rate_only: Option<bool>,
	pub max_monthly: Option<f64>,
	pub sort: Option<SortMode>,
	pub category: Option<Category>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intent {
	pub constraints: ConstraintSet,
	/// Human-readable summary of the constraints that took effect, keyed by constraint name.
	pub applied: BTreeMap<String, String>,
}

pub fn extract(query: &str, refine: Option<&Refine>) -> Intent {
	let mut constraints = ConstraintSet::default();

	if let Some(refine) = refine {
		if refine.zero_rate_only.unwrap_or(false) {
			constraints.zero_rate_only = true;
		}
		if let Some(max_monthly) = refine.max_monthly.filter(|value| value.is_finite()) {
			constraints.max_monthly = Some(max_monthly);
		}

		constraints.sort = refine.sort;
		constraints.category = refine.category;
	}

	let (max_price, max_monthly) = parse_amounts(query);

	if max_price.is_some() {
		constraints.max_price = max_price;
	}
	if let Some(parsed) = max_monthly
		&& constraints.max_monthly.map(|current| parsed < current).unwrap_or(true)
	{
		constraints.max_monthly = Some(parsed);
	}
	if ZERO_RATE.is_match(query) {
		constraints.zero_rate_only = true;
	}
	if constraints.category.is_none() {
		constraints.category = detect_category(query);
	}

	constraints.keywords = WORD
		.find_iter(query)
		.map(|m| m.as_str())
		.filter(|token| token.len() > 2 && !STOPWORDS.contains(token))
		.map(str::to_string)
		.collect();

	let applied = applied_constraints(&constraints);

	Intent { constraints, applied }
}

pub fn detect_category(query: &str) -> Option<Category> {
	CATEGORY_KEYWORDS
		.iter()
		.find(|(_, keywords)| keywords.iter().any(|keyword| query.contains(keyword)))
		.map(|(category, _)| *category)
}

pub fn applied_constraints(constraints: &ConstraintSet) -> BTreeMap<String, String> {
	let mut applied = BTreeMap::new();

	if let Some(max_price) = constraints.max_price {
		applied.insert("max_price".to_string(), format!("${max_price:.0}"));
	}
	if let Some(max_monthly) = constraints.max_monthly {
		applied.insert("max_monthly".to_string(), format!("${max_monthly:.0}/mo"));
	}
	if let Some(category) = constraints.category {
		applied.insert("category".to_string(), category.to_string());
	}
	if constraints.zero_rate_only {
		applied.insert("zero_rate_only".to_string(), "0% APR".to_string());
	}
	if let Some(sort) = constraints.sort {
		applied.insert("sort".to_string(), sort.as_str().to_string());
	}

	applied
}

// The first "under $X" not followed by a slash is a total-price cap; the first one followed by a
// per-month marker is a monthly cap.
fn parse_amounts(query: &str) -> (Option<f64>, Option<f64>) {
	let mut max_price = None;
	let mut max_monthly = None;

	for caps in UNDER_AMOUNT.captures_iter(query) {
		let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else { continue };
		let Some(amount) = parse_amount(digits.as_str()) else { continue };
		let rest = &query[whole.end()..];

		if MONTHLY_SUFFIX.is_match(rest) {
			max_monthly.get_or_insert(amount);
		} else if !SLASH_SUFFIX.is_match(rest) {
			max_price.get_or_insert(amount);
		}
	}

	(max_price, max_monthly)
}

fn parse_amount(raw: &str) -> Option<f64> {
	let digits: String = raw.chars().filter(|ch| *ch != ',').collect();

	if digits.is_empty() {
		return None;
	}

	digits.parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_total_price_cap() {
		let intent = extract("laptop under $1,000", None);

		assert_eq!(intent.constraints.max_price, Some(1_000.0));
		assert_eq!(intent.constraints.max_monthly, None);
		assert_eq!(intent.constraints.category, Some(Category::Electronics));
	}

	#[test]
	fn monthly_marker_is_not_a_total_price() {
		let intent = extract("stay under $50/mo", None);

		assert_eq!(intent.constraints.max_monthly, Some(50.0));
		assert_eq!(intent.constraints.max_price, None);

		let intent = extract("sofa under $120 per month", None);

		assert_eq!(intent.constraints.max_monthly, Some(120.0));
		assert_eq!(intent.constraints.max_price, None);
	}

	#[test]
	fn parsed_monthly_only_tightens_refine_value() {
		let refine = Refine { max_monthly: Some(40.0), ..Default::default() };
		let intent = extract("shoes under $60 monthly", Some(&refine));

		assert_eq!(intent.constraints.max_monthly, Some(40.0));

		let refine = Refine { max_monthly: Some(80.0), ..Default::default() };
		let intent = extract("shoes under $60 monthly", Some(&refine));

		assert_eq!(intent.constraints.max_monthly, Some(60.0));
	}

	#[test]
	fn detects_zero_rate_phrases() {
		for query in ["laptop 0% apr", "zero apr tv", "sofa with no interest"] {
			assert!(extract(query, None).constraints.zero_rate_only, "{query}");
		}
	}

	#[test]
	fn refine_category_wins_over_keywords() {
		let refine = Refine { category: Some(Category::Gaming), ..Default::default() };
		let intent = extract("laptop", Some(&refine));

		assert_eq!(intent.constraints.category, Some(Category::Gaming));
	}

	#[test]
	fn keywords_drop_stopwords_and_short_tokens() {
		let intent = extract("i want a new macbook for my trip", None);

		assert_eq!(intent.constraints.keywords, vec!["new", "macbook", "trip"]);
	}

	#[test]
	fn applied_constraints_summarize_effective_values() {
		let intent = extract("gaming under $700 0% apr", None);

		assert_eq!(intent.applied.get("max_price").map(String::as_str), Some("$700"));
		assert_eq!(intent.applied.get("category").map(String::as_str), Some("gaming"));
		assert_eq!(intent.applied.get("zero_rate_only").map(String::as_str), Some("0% APR"));
		assert!(!intent.applied.contains_key("sort"));
	}
}
