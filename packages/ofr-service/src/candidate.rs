use ofr_domain::{EligibilityTier, Item};

/// Request-scoped copy of a catalog item plus the scores each stage writes.
#[derive(Clone, Debug)]
pub struct Candidate {
	pub item: Item,
	pub similarity: Option<f64>,
	pub lexical: Option<f64>,
	pub rerank: Option<f64>,
	pub rank: Option<f64>,
	pub eligibility: Option<EligibilityTier>,
	pub capped: bool,
	pub reason: Option<String>,
}
impl Candidate {
	pub fn from_item(item: &Item) -> Self {
		Self {
			item: item.clone(),
			similarity: None,
			lexical: None,
			rerank: None,
			rank: None,
			eligibility: item.eligibility_hint,
			capped: false,
			reason: None,
		}
	}

	pub fn id(&self) -> &str {
		&self.item.id
	}
}
