pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),

	#[error(transparent)]
	Config(#[from] ofr_config::Error),

	#[error(transparent)]
	Service(#[from] ofr_service::Error),
}
