use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub catalog: Catalog,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub rerank: Rerank,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub profile: Profile,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Catalog {
	/// Optional. JSON file with catalog offers; the bundled seed catalog is used when absent.
	pub path: Option<PathBuf>,
	pub embedding_dim: u32,
}
impl Default for Catalog {
	fn default() -> Self {
		Self { path: None, embedding_dim: 384 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub max_candidates: u32,
	pub top_k: u32,
	pub relax_floor: u32,
	pub relax_ceiling: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { max_candidates: 50, top_k: 20, relax_floor: 3, relax_ceiling: 8 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rerank {
	pub max_candidates: u32,
	pub timeout_ms: u64,
	pub category_boost: f64,
	pub keyword_boost: f64,
	pub max_boost: f64,
	/// Optional. Relevance model endpoint; the deterministic fallback scorer is used when absent.
	pub model: Option<ProviderConfig>,
}
impl Default for Rerank {
	fn default() -> Self {
		Self {
			max_candidates: 30,
			timeout_ms: 500,
			category_boost: 0.15,
			keyword_boost: 0.1,
			max_boost: 0.3,
			model: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub max_results: u32,
	/// Subtracted from the composite score of a candidate that breaks an explicit constraint.
	pub constraint_penalty: f64,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { max_results: 5, constraint_penalty: 0.3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Profile {
	pub name: String,
	pub spending_power: f64,
	pub active_plans_count: u32,
	pub payment_status: String,
	pub account_health: String,
	/// Optional. JSON file with payment history (eligibility note, active plans, insights);
	/// the bundled demo history is used when absent.
	pub history_path: Option<PathBuf>,
}
impl Default for Profile {
	fn default() -> Self {
		Self {
			name: "Demo User".to_string(),
			spending_power: 1_200.0,
			active_plans_count: 3,
			payment_status: "excellent".to_string(),
			account_health: "strong".to_string(),
			history_path: None,
		}
	}
}
