use std::sync::Arc;

use ofr_service::OfferService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<OfferService>,
}
impl AppState {
	pub async fn new(config: ofr_config::Config) -> color_eyre::Result<Self> {
		let service = OfferService::new(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: OfferService) -> Self {
		Self { service: Arc::new(service) }
	}
}
