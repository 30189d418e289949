pub mod candidate;
pub mod catalog;
pub mod eligibility;
pub mod explain;
pub mod feedback;
pub mod index;
pub mod pipeline;
pub mod profile;
pub mod rank;
pub mod rerank;
pub mod retrieve;

mod error;

pub use candidate::Candidate;
pub use error::{Error, Result};
pub use explain::MonthlyImpact;
pub use feedback::{FeedbackRecord, FeedbackRequest, FeedbackResponse, Rating};
pub use index::{CatalogIndex, Hit, SearchIndex};
pub use pipeline::{
	OfferResult, PipelineState, SearchRequest, SearchResponse, StageUpdate, TraceStep,
};
pub use profile::{
	ActivePlan, EligibilitySummary, Insight, PaymentHistory, ProfileSummary, UserProfile,
};
pub use rerank::ModelHandle;
pub use retrieve::RetrievalPath;

use std::{future::Future, pin::Pin, sync::Arc};

use ofr_config::{Catalog, Config, Profile, ProviderConfig};
use ofr_domain::{
	guardrail::{self, GuardOutcome},
	intent::{self, Intent, Refine},
};
use ofr_providers::{embedding, rerank::RerankClient};

use feedback::FeedbackLog;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a Catalog,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// A loaded relevance model that scores (query, document) pairs.
pub trait RelevanceModel
where
	Self: Send + Sync,
{
	fn score<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait RelevanceModelLoader
where
	Self: Send + Sync,
{
	fn load<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
	) -> BoxFuture<'a, color_eyre::Result<Arc<dyn RelevanceModel>>>;
}

pub trait ProfileProvider
where
	Self: Send + Sync,
{
	fn profile<'a>(
		&'a self,
		cfg: &'a Profile,
		user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<ProfileSummary>>;
}

pub trait QueryGuard
where
	Self: Send + Sync,
{
	fn guard(&self, raw: &str) -> GuardOutcome;
}

pub trait IntentExtractor
where
	Self: Send + Sync,
{
	fn extract(&self, query: &str, refine: Option<&Refine>) -> Intent;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub relevance: Arc<dyn RelevanceModelLoader>,
	pub profile: Arc<dyn ProfileProvider>,
	pub guard: Arc<dyn QueryGuard>,
	pub intent: Arc<dyn IntentExtractor>,
}

pub struct OfferService {
	pub cfg: Config,
	pub index: Arc<dyn SearchIndex>,
	pub providers: Providers,
	pub model: ModelHandle,
	pub feedback: FeedbackLog,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a Catalog,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(texts, cfg.embedding_dim as usize)?) })
	}
}

impl RelevanceModelLoader for DefaultProviders {
	fn load<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
	) -> BoxFuture<'a, color_eyre::Result<Arc<dyn RelevanceModel>>> {
		Box::pin(async move {
			let client: Arc<dyn RelevanceModel> = Arc::new(RerankClient::new(cfg)?);

			Ok(client)
		})
	}
}

impl RelevanceModel for RerankClient {
	fn score<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Ok(RerankClient::score(self, query, docs).await?) })
	}
}

impl ProfileProvider for DefaultProviders {
	fn profile<'a>(
		&'a self,
		cfg: &'a Profile,
		user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<ProfileSummary>> {
		Box::pin(async move { Ok(ProfileSummary::from_config(cfg, user_id)?) })
	}
}

impl QueryGuard for DefaultProviders {
	fn guard(&self, raw: &str) -> GuardOutcome {
		guardrail::guard(raw)
	}
}

impl IntentExtractor for DefaultProviders {
	fn extract(&self, query: &str, refine: Option<&Refine>) -> Intent {
		intent::extract(query, refine)
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		relevance: Arc<dyn RelevanceModelLoader>,
		profile: Arc<dyn ProfileProvider>,
	) -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding, relevance, profile, guard: provider.clone(), intent: provider }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			relevance: provider.clone(),
			profile: provider.clone(),
			guard: provider.clone(),
			intent: provider,
		}
	}
}

impl OfferService {
	/// Loads the configured catalog (or the bundled seed catalog) and builds the index.
	pub async fn new(cfg: Config) -> Result<Self> {
		Self::with_providers(cfg, Providers::default()).await
	}

	pub async fn with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		let items = catalog::load(&cfg.catalog)?;
		let items =
			catalog::embed_missing(items, &cfg.catalog, providers.embedding.as_ref()).await?;
		let index = CatalogIndex::build(items, cfg.catalog.embedding_dim as usize)?;

		tracing::info!(items = index.len(), "Catalog index built.");

		Ok(Self::with_index(cfg, Arc::new(index), providers))
	}

	pub fn with_index(cfg: Config, index: Arc<dyn SearchIndex>, providers: Providers) -> Self {
		let model = ModelHandle::new(cfg.rerank.model.clone(), providers.relevance.clone());

		Self { cfg, index, providers, model, feedback: FeedbackLog::default() }
	}
}
