mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Catalog, Config, Profile, ProviderConfig, Ranking, Rerank, Retrieval, Service};

use std::{fs, path::Path};

/// Upper bound on `ranking.max_results`; callers rely on at most five offers per response.
pub const MAX_RESULTS_CAP: u32 = 5;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg = parse(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn parse(raw: &str) -> std::result::Result<Config, toml::de::Error> {
	toml::from_str(raw)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.catalog.embedding_dim == 0 {
		return Err(Error::Validation {
			message: "catalog.embedding_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.max_candidates == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_candidates must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.relax_ceiling == 0 {
		return Err(Error::Validation {
			message: "retrieval.relax_ceiling must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.relax_floor > cfg.retrieval.relax_ceiling {
		return Err(Error::Validation {
			message: "retrieval.relax_floor must be less than or equal to retrieval.relax_ceiling."
				.to_string(),
		});
	}
	if cfg.rerank.max_candidates == 0 {
		return Err(Error::Validation {
			message: "rerank.max_candidates must be greater than zero.".to_string(),
		});
	}
	if cfg.rerank.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "rerank.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("rerank.category_boost", cfg.rerank.category_boost),
		("rerank.keyword_boost", cfg.rerank.keyword_boost),
		("rerank.max_boost", cfg.rerank.max_boost),
		("ranking.constraint_penalty", cfg.ranking.constraint_penalty),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.ranking.max_results == 0 || cfg.ranking.max_results > MAX_RESULTS_CAP {
		return Err(Error::Validation {
			message: format!("ranking.max_results must be between 1 and {MAX_RESULTS_CAP}."),
		});
	}
	if !cfg.profile.spending_power.is_finite() || cfg.profile.spending_power < 0.0 {
		return Err(Error::Validation {
			message: "profile.spending_power must be a finite number zero or greater.".to_string(),
		});
	}

	if let Some(model) = cfg.rerank.model.as_ref() {
		for (label, value) in [
			("rerank.model.provider_id", &model.provider_id),
			("rerank.model.api_base", &model.api_base),
			("rerank.model.path", &model.path),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}

		if model.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "rerank.model.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.catalog.path.as_deref().map(|path| path.as_os_str().is_empty()).unwrap_or(false) {
		cfg.catalog.path = None;
	}
	if cfg.profile.history_path.as_deref().map(|path| path.as_os_str().is_empty()).unwrap_or(false)
	{
		cfg.profile.history_path = None;
	}
	// "none" disables the relevance model the same way an absent table does.
	if cfg
		.rerank
		.model
		.as_ref()
		.map(|model| {
			let name = model.model.trim();

			name.is_empty() || name.eq_ignore_ascii_case("none")
		})
		.unwrap_or(false)
	{
		cfg.rerank.model = None;
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
