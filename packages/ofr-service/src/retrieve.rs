use std::{collections::HashSet, fmt};

use serde::Serialize;

use ofr_domain::ConstraintSet;

use crate::{Candidate, SearchIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalPath {
	Hybrid,
	LexicalOnly,
	VectorOnly,
	FallbackUnfiltered,
}
impl RetrievalPath {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Hybrid => "hybrid",
			Self::LexicalOnly => "lexical-only",
			Self::VectorOnly => "vector-only",
			Self::FallbackUnfiltered => "fallback-unfiltered",
		}
	}

	pub fn is_degraded(self) -> bool {
		self != Self::Hybrid
	}
}

impl fmt::Display for RetrievalPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug)]
pub struct RetrievalOutcome {
	pub candidates: Vec<Candidate>,
	pub path: RetrievalPath,
	pub merged: usize,
	pub lexical_only: usize,
	/// Candidates that passed every filter, before relaxation.
	pub strict: usize,
	pub relaxed: bool,
}
impl RetrievalOutcome {
	pub fn note(&self) -> String {
		let mut note = format!(
			"{} → {} merged, {} bm25-only → {} after filter",
			self.path,
			self.merged,
			self.lexical_only,
			self.candidates.len()
		);

		if self.relaxed {
			note.push_str(&format!(" (relaxed from {})", self.strict));
		}

		note
	}
}

/// Hybrid retrieval with per-search circuit breaking, constraint filters, and relaxation.
///
/// `query_embedding` carries the embedder's result so that an embedding failure degrades the
/// vector path the same way an index failure does. No error escapes this function.
pub fn retrieve(
	index: &dyn SearchIndex,
	query_embedding: color_eyre::Result<Vec<f32>>,
	query: &str,
	constraints: &ConstraintSet,
	cfg: &ofr_config::Retrieval,
) -> RetrievalOutcome {
	let top_k = cfg.top_k as usize;
	let cap = cfg.max_candidates as usize;
	let items = index.items();
	let mut path = RetrievalPath::Hybrid;
	let vector_result = query_embedding.map_err(|err| err.to_string()).and_then(|embedding| {
		index.vector_search(&embedding, top_k).map_err(|err| err.to_string())
	});
	let vector_hits = match vector_result {
		Ok(hits) => hits,
		Err(message) => {
			tracing::warn!(
				error = %message,
				"Vector search failed. Continuing with lexical search."
			);

			path = RetrievalPath::LexicalOnly;

			Vec::new()
		},
	};
	let lexical_hits = match index.lexical_search(query, top_k) {
		Ok(hits) => hits,
		Err(err) => {
			path = if path == RetrievalPath::LexicalOnly {
				RetrievalPath::FallbackUnfiltered
			} else {
				RetrievalPath::VectorOnly
			};

			tracing::warn!(error = %err, path = %path, "Lexical search failed.");

			Vec::new()
		},
	};
	let mut merged: Vec<Candidate> = Vec::new();
	let mut seen: HashSet<&str> = HashSet::new();

	for hit in &vector_hits {
		let Some(item) = items.get(hit.position) else { continue };

		if seen.insert(item.id.as_str()) {
			let mut candidate = Candidate::from_item(item);

			candidate.similarity = Some(hit.score);

			merged.push(candidate);
		}
	}
	for hit in &lexical_hits {
		let Some(item) = items.get(hit.position) else { continue };

		if seen.insert(item.id.as_str()) {
			let mut candidate = Candidate::from_item(item);

			candidate.lexical = Some(hit.score);

			merged.push(candidate);
		} else if let Some(existing) = merged.iter_mut().find(|c| c.id() == item.id) {
			existing.lexical = Some(hit.score);
		}
	}

	if merged.is_empty() && path == RetrievalPath::FallbackUnfiltered {
		tracing::warn!("Both searches failed. Using catalog order.");

		merged = items.iter().take(cap).map(Candidate::from_item).collect();
	}

	merged.truncate(cap);

	let lexical_only =
		merged.iter().filter(|c| c.lexical.is_some() && c.similarity.is_none()).count();
	let mut filtered = merged.clone();

	filtered.retain(|c| constraints.category_allows(&c.item));
	filtered.retain(|c| constraints.price_allows(&c.item));
	filtered.retain(|c| constraints.monthly_allows(&c.item));
	filtered.retain(|c| constraints.rate_allows(&c.item));

	let strict = filtered.len();
	let relaxed = strict < cfg.relax_floor as usize;

	if relaxed {
		relax(&mut filtered, &merged, cfg.relax_ceiling as usize);

		tracing::info!(strict, relaxed_to = filtered.len(), "Relaxed retrieval filters.");
	}

	RetrievalOutcome {
		candidates: filtered,
		path,
		merged: merged.len(),
		lexical_only,
		strict,
		relaxed,
	}
}

// Pads from the vector pool, or from the merged pool when the vector path produced nothing.
fn relax(filtered: &mut Vec<Candidate>, merged: &[Candidate], ceiling: usize) {
	let vector_pool: Vec<&Candidate> = merged.iter().filter(|c| c.similarity.is_some()).collect();
	let pool = if vector_pool.is_empty() { merged.iter().collect() } else { vector_pool };
	let mut seen: HashSet<String> = filtered.iter().map(|c| c.id().to_string()).collect();

	for candidate in pool {
		if filtered.len() >= ceiling {
			break;
		}
		if seen.insert(candidate.id().to_string()) {
			filtered.push(candidate.clone());
		}
	}
}
