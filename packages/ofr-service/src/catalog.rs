use std::{collections::HashSet, fs};

use ofr_config::Catalog;
use ofr_domain::Item;

use crate::{EmbeddingProvider, Error, Result};

const SEED_CATALOG: &str = include_str!("../data/seed_catalog.json");

/// Reads the catalog file named by the config, or the bundled seed catalog when none is set.
pub fn load(cfg: &Catalog) -> Result<Vec<Item>> {
	let items = match cfg.path.as_ref() {
		Some(path) => {
			let raw = fs::read_to_string(path).map_err(|err| Error::Catalog {
				message: format!("Failed to read catalog file at {path:?}: {err}"),
			})?;

			parse(&raw)?
		},
		None => seed()?,
	};

	validate(&items)?;

	Ok(items)
}

pub fn seed() -> Result<Vec<Item>> {
	parse(SEED_CATALOG)
}

pub fn parse(raw: &str) -> Result<Vec<Item>> {
	serde_json::from_str(raw)
		.map_err(|err| Error::Catalog { message: format!("Failed to parse catalog: {err}") })
}

pub fn validate(items: &[Item]) -> Result<()> {
	if items.is_empty() {
		return Err(catalog_error("Catalog must contain at least one item."));
	}

	let mut seen = HashSet::new();

	for item in items {
		if item.id.trim().is_empty() {
			return Err(catalog_error("Catalog item id must be non-empty."));
		}
		if !seen.insert(item.id.as_str()) {
			return Err(catalog_error(&format!("Duplicate catalog item id {}.", item.id)));
		}

		for (label, value) in [
			("total_price", item.total_price),
			("apr", item.apr),
			("monthly_payment", item.monthly_payment),
		] {
			if !value.is_finite() || value < 0.0 {
				return Err(catalog_error(&format!(
					"Catalog item {} has invalid {label}; expected a finite non-negative number.",
					item.id
				)));
			}
		}

		if item.term_months == 0 {
			return Err(catalog_error(&format!(
				"Catalog item {} must have a term of at least one month.",
				item.id
			)));
		}
	}

	Ok(())
}

/// Fills empty embeddings from the embedding provider using each item's descriptive text.
pub async fn embed_missing(
	mut items: Vec<Item>,
	cfg: &Catalog,
	embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Item>> {
	let missing: Vec<usize> = items
		.iter()
		.enumerate()
		.filter(|(_, item)| item.embedding.is_empty())
		.map(|(i, _)| i)
		.collect();

	if missing.is_empty() {
		return Ok(items);
	}

	let texts: Vec<String> = missing.iter().map(|&i| items[i].embedding_text()).collect();
	let vectors = embedder.embed(cfg, &texts).await?;

	if vectors.len() != missing.len() {
		return Err(Error::Provider {
			message: format!(
				"Embedding provider returned {} vectors for {} catalog items.",
				vectors.len(),
				missing.len()
			),
		});
	}

	for (i, vec) in missing.into_iter().zip(vectors) {
		items[i].embedding = vec;
	}

	Ok(items)
}

fn catalog_error(message: &str) -> Error {
	Error::Catalog { message: message.to_string() }
}
