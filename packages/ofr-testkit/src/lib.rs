mod error;

pub use error::{Error, Result};

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;

use ofr_config::{Catalog, Config, Profile, ProviderConfig};
use ofr_domain::{Category, Item, tokenize};
use ofr_service::{
	BoxFuture, CatalogIndex, EmbeddingProvider, Hit, OfferService, ProfileProvider, ProfileSummary,
	Providers, RelevanceModel, RelevanceModelLoader, SearchIndex, catalog,
};

/// Axes: electronics, home, travel, gaming.
pub const SAMPLE_DIM: usize = 4;

const SAMPLE_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "debug"

[catalog]
embedding_dim = 4

[profile]
spending_power = 1200.0
"#;
const SAMPLE_ITEMS: &str = include_str!("../data/sample_items.json");
const AXIS_TERMS: [&[&str]; SAMPLE_DIM] = [
	&["laptop", "macbook", "dell", "asus", "headphones", "sony", "tv", "oled", "electronics"],
	&["sofa", "mattress", "home", "couch", "sectional"],
	&["trip", "beach", "cancun", "miami", "travel", "nights", "weekend"],
	&["console", "playstation", "gaming", "ps5"],
];

pub fn sample_config() -> Result<Config> {
	let cfg = ofr_config::parse(SAMPLE_CONFIG)
		.map_err(|err| Error::Message(format!("Failed to parse sample config: {err}.")))?;

	ofr_config::validate(&cfg)?;

	Ok(cfg)
}

pub fn model_config() -> ProviderConfig {
	ProviderConfig {
		provider_id: "stub".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: String::new(),
		path: "/v1/rerank".to_string(),
		model: "stub-reranker".to_string(),
		timeout_ms: 1_000,
		default_headers: Default::default(),
	}
}

/// Ten offers across four categories with hand-placed embeddings on the sample axes.
pub fn sample_items() -> Result<Vec<Item>> {
	Ok(catalog::parse(SAMPLE_ITEMS)?)
}

pub fn sample_index() -> Result<CatalogIndex> {
	Ok(CatalogIndex::build(sample_items()?, SAMPLE_DIM)?)
}

/// A catalog of `count` offers, larger than the retrieval caps when `count` exceeds 50.
///
/// The first half are "Widget" offers and the rest "Gadget" offers. Embeddings lean further
/// toward the last axis as the position grows, so later items sit closer to an
/// axis-neutral query vector and vector search favors the tail of the catalog.
pub fn generated_items(count: usize) -> Vec<Item> {
	let span = count.saturating_sub(1).max(1) as f32;

	(0..count)
		.map(|position| {
			let kind = if position < count / 2 { "Widget" } else { "Gadget" };
			let total_price = 100.0 + position as f64;

			Item {
				id: format!("gen-{position:03}"),
				merchant: "Generic Outlet".to_string(),
				product: format!("{kind} {position}"),
				category: Category::Electronics,
				total_price,
				term_months: 12,
				apr: 0.0,
				monthly_payment: total_price / 12.0,
				eligibility_hint: None,
				disclosure: None,
				embedding: vec![1.0, 1.0, 1.0, position as f32 / span],
				tokens: Vec::new(),
			}
		})
		.collect()
}

pub fn generated_index(count: usize) -> Result<CatalogIndex> {
	Ok(CatalogIndex::build(generated_items(count), SAMPLE_DIM)?)
}

pub fn service(cfg: Config, index: Arc<dyn SearchIndex>, providers: Providers) -> OfferService {
	OfferService::with_index(cfg, index, providers)
}

/// Sample config, sample index and keyword embeddings with the default guard and intent.
pub fn sample_service() -> Result<OfferService> {
	Ok(service(sample_config()?, Arc::new(sample_index()?), stub_providers()))
}

pub fn stub_providers() -> Providers {
	Providers::new(
		Arc::new(KeywordEmbedding),
		Arc::new(ModelLoader::failing()),
		Arc::new(StaticProfile { spending_power: 1_200.0 }),
	)
}

/// Embeds text by counting axis keywords, with a small floor so vectors are never zero.
pub struct KeywordEmbedding;
impl KeywordEmbedding {
	pub fn vector(text: &str) -> Vec<f32> {
		let tokens = tokenize::tokenize(text);

		AXIS_TERMS
			.iter()
			.map(|terms| {
				let hits = tokens.iter().filter(|token| terms.contains(&token.as_str())).count();

				0.05 + hits as f32
			})
			.collect()
	}
}

impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a Catalog,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| Self::vector(text)).collect()) })
	}
}

pub struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a Catalog,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Err(eyre::eyre!("Embedding backend is offline.")) })
	}
}

/// Scores a document by the share of query words it contains, after an optional delay.
pub struct StubModel {
	pub delay: Duration,
	pub calls: AtomicUsize,
}
impl StubModel {
	pub fn new(delay: Duration) -> Self {
		Self { delay, calls: AtomicUsize::new(0) }
	}

	pub fn score_doc(query: &str, doc: &str) -> f32 {
		let query_terms = tokenize::tokenize(query);
		let doc_terms = tokenize::tokenize(doc);

		if query_terms.is_empty() {
			return 0.0;
		}

		let hits = query_terms.iter().filter(|term| doc_terms.contains(term)).count();

		hits as f32 / query_terms.len() as f32
	}
}

impl RelevanceModel for StubModel {
	fn score<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}

			Ok(docs.iter().map(|doc| Self::score_doc(query, doc)).collect())
		})
	}
}

pub struct BrokenModel;
impl RelevanceModel for BrokenModel {
	fn score<'a>(
		&'a self,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Err(eyre::eyre!("Relevance model crashed.")) })
	}
}

/// Hands out a fixed model, or fails every load when none is set. Counts load attempts.
pub struct ModelLoader {
	model: Option<Arc<dyn RelevanceModel>>,
	loads: AtomicUsize,
}
impl ModelLoader {
	pub fn serving(model: Arc<dyn RelevanceModel>) -> Self {
		Self { model: Some(model), loads: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self { model: None, loads: AtomicUsize::new(0) }
	}

	pub fn loads(&self) -> usize {
		self.loads.load(Ordering::SeqCst)
	}
}

impl RelevanceModelLoader for ModelLoader {
	fn load<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
	) -> BoxFuture<'a, color_eyre::Result<Arc<dyn RelevanceModel>>> {
		self.loads.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.model
				.clone()
				.ok_or_else(|| eyre::eyre!("Model {} is not available.", cfg.model))
		})
	}
}

pub struct StaticProfile {
	pub spending_power: f64,
}
impl ProfileProvider for StaticProfile {
	fn profile<'a>(
		&'a self,
		cfg: &'a Profile,
		user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<ProfileSummary>> {
		Box::pin(async move {
			let summary = ProfileSummary::from_config(cfg, user_id)?;

			Ok(summary.with_spending_power(self.spending_power))
		})
	}
}

pub struct FailingProfile;
impl ProfileProvider for FailingProfile {
	fn profile<'a>(
		&'a self,
		_cfg: &'a Profile,
		_user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<ProfileSummary>> {
		Box::pin(async move { Err(eyre::eyre!("Profile service is unreachable.")) })
	}
}

/// Wraps an index and fails the selected searches.
pub struct FailingIndex {
	pub inner: CatalogIndex,
	pub vector: bool,
	pub lexical: bool,
}
impl SearchIndex for FailingIndex {
	fn items(&self) -> &[Item] {
		self.inner.items()
	}

	fn vector_search(&self, query: &[f32], k: usize) -> ofr_service::Result<Vec<Hit>> {
		if self.vector {
			return Err(ofr_service::Error::Index { message: "Vector search is down.".to_string() });
		}

		self.inner.vector_search(query, k)
	}

	fn lexical_search(&self, query: &str, k: usize) -> ofr_service::Result<Vec<Hit>> {
		if self.lexical {
			return Err(ofr_service::Error::Index {
				message: "Lexical search is down.".to_string(),
			});
		}

		self.inner.lexical_search(query, k)
	}
}
