use ofr_domain::guardrail::RejectCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{message}")]
	Rejected { code: RejectCode, message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Catalog error: {message}")]
	Catalog { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<RejectCode> for Error {
	fn from(code: RejectCode) -> Self {
		Self::Rejected { code, message: code.message().to_string() }
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
