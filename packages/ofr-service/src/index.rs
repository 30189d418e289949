use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use ofr_domain::{Item, tokenize};

use crate::{Error, Result};

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

/// A search result: the item's position in catalog order and its score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
	pub position: usize,
	pub score: f64,
}

/// Read-only search over the catalog. Both searches fail only on an empty corpus or a
/// malformed query; an empty result is not an error.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	fn items(&self) -> &[Item];

	fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>>;

	fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Hit>>;
}

pub struct CatalogIndex {
	items: Vec<Item>,
	dim: usize,
	lexical: LexicalIndex,
}
impl CatalogIndex {
	pub fn build(mut items: Vec<Item>, dim: usize) -> Result<Self> {
		for item in &mut items {
			validate_embedding(item, dim)?;

			item.tokens = tokenize::tokenize(&item.lexical_text());
		}

		let lexical = LexicalIndex::build(&items);

		Ok(Self { items, dim, lexical })
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

impl SearchIndex for CatalogIndex {
	fn items(&self) -> &[Item] {
		&self.items
	}

	fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
		ensure_non_empty(&self.items)?;

		if query.len() != self.dim {
			return Err(Error::Index {
				message: format!(
					"Query embedding has dimension {} but the index expects {}.",
					query.len(),
					self.dim
				),
			});
		}

		let mut hits: Vec<Hit> = self
			.items
			.iter()
			.enumerate()
			.map(|(position, item)| Hit {
				position,
				score: cosine_similarity(query, &item.embedding).unwrap_or(0.0) as f64,
			})
			.collect();

		sort_hits(&mut hits);
		hits.truncate(k);

		Ok(hits)
	}

	fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
		ensure_non_empty(&self.items)?;

		let mut hits = self.lexical.score(query);

		sort_hits(&mut hits);
		hits.truncate(k);

		Ok(hits)
	}
}

// BM25 postings over item tokens.
struct LexicalIndex {
	postings: HashMap<String, Vec<(usize, u32)>>,
	doc_lens: Vec<usize>,
	avg_len: f64,
}
impl LexicalIndex {
	fn build(items: &[Item]) -> Self {
		let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
		let mut doc_lens = Vec::with_capacity(items.len());

		for (position, item) in items.iter().enumerate() {
			let mut counts: HashMap<&str, u32> = HashMap::new();

			for token in &item.tokens {
				*counts.entry(token.as_str()).or_default() += 1;
			}
			for (token, tf) in counts {
				postings.entry(token.to_string()).or_default().push((position, tf));
			}

			doc_lens.push(item.tokens.len());
		}

		let total: usize = doc_lens.iter().sum();
		let avg_len = if doc_lens.is_empty() { 0.0 } else { total as f64 / doc_lens.len() as f64 };

		Self { postings, doc_lens, avg_len }
	}

	fn score(&self, query: &str) -> Vec<Hit> {
		let n = self.doc_lens.len() as f64;
		let mut scores = vec![0.0_f64; self.doc_lens.len()];
		let mut seen = HashSet::new();

		for term in tokenize::tokenize(query) {
			if !seen.insert(term.clone()) {
				continue;
			}

			let Some(postings) = self.postings.get(&term) else { continue };
			let df = postings.len() as f64;
			let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

			for &(position, tf) in postings {
				let tf = tf as f64;
				let len_ratio = if self.avg_len > 0.0 {
					self.doc_lens[position] as f64 / self.avg_len
				} else {
					1.0
				};
				let norm = 1.0 - BM25_B + BM25_B * len_ratio;

				scores[position] += idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm);
			}
		}

		scores
			.into_iter()
			.enumerate()
			.filter(|(_, score)| *score > 0.0)
			.map(|(position, score)| Hit { position, score })
			.collect()
	}
}

pub fn cmp_score_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

// Stable, so equal scores stay in catalog order.
fn sort_hits(hits: &mut [Hit]) {
	hits.sort_by(|a, b| cmp_score_desc(a.score, b.score));
}

fn ensure_non_empty(items: &[Item]) -> Result<()> {
	if items.is_empty() {
		return Err(Error::Index { message: "Catalog index is empty.".to_string() });
	}

	Ok(())
}

fn validate_embedding(item: &Item, dim: usize) -> Result<()> {
	if item.embedding.len() != dim {
		return Err(Error::Catalog {
			message: format!(
				"Catalog item {} has embedding dimension {}; expected {dim}.",
				item.id,
				item.embedding.len()
			),
		});
	}
	if item.embedding.iter().any(|value| !value.is_finite()) {
		return Err(Error::Catalog {
			message: format!("Catalog item {} has a non-finite embedding value.", item.id),
		});
	}

	let norm = item.embedding.iter().map(|value| value * value).sum::<f32>();

	if norm <= f32::EPSILON {
		return Err(Error::Catalog {
			message: format!("Catalog item {} has a zero-norm embedding.", item.id),
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use ofr_domain::Category;

	use super::*;

	fn item(id: &str, merchant: &str, product: &str, embedding: Vec<f32>) -> Item {
		Item {
			id: id.to_string(),
			merchant: merchant.to_string(),
			product: product.to_string(),
			category: Category::Electronics,
			total_price: 100.0,
			term_months: 6,
			apr: 0.0,
			monthly_payment: 16.67,
			eligibility_hint: None,
			disclosure: None,
			embedding,
			tokens: Vec::new(),
		}
	}

	fn sample_index() -> CatalogIndex {
		CatalogIndex::build(
			vec![
				item("a", "Best Buy", "Dell XPS 14 Laptop", vec![1.0, 0.0]),
				item("b", "Newegg", "ASUS ROG Laptop Laptop", vec![0.0, 1.0]),
				item("c", "Amazon", "Kindle Scribe", vec![1.0, 0.0]),
			],
			2,
		)
		.expect("Failed to build index.")
	}

	#[test]
	fn build_fills_lexical_tokens() {
		let index = sample_index();

		assert_eq!(
			index.items()[0].tokens,
			vec!["best", "buy", "dell", "xps", "14", "laptop", "electronics"]
		);
	}

	#[test]
	fn vector_ties_keep_catalog_order() {
		let hits = sample_index().vector_search(&[2.0, 0.0], 3).expect("Search failed.");
		let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();

		assert_eq!(positions, vec![0, 2, 1]);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
	}

	#[test]
	fn vector_search_rejects_dimension_mismatch() {
		assert!(matches!(sample_index().vector_search(&[1.0], 3), Err(Error::Index { .. })));
	}

	#[test]
	fn empty_corpus_is_an_error_for_both_searches() {
		let index = CatalogIndex::build(Vec::new(), 2).expect("Failed to build empty index.");

		assert!(index.vector_search(&[1.0, 0.0], 3).is_err());
		assert!(index.lexical_search("laptop", 3).is_err());
	}

	#[test]
	fn bm25_rewards_term_frequency_and_skips_non_matches() {
		let hits = sample_index().lexical_search("laptop", 10).expect("Search failed.");
		let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();

		assert_eq!(positions, vec![1, 0]);
		assert!(hits.iter().all(|hit| hit.score > 0.0));
	}

	#[test]
	fn bm25_matches_reference_formula() {
		let index = sample_index();
		let hits = index.lexical_search("kindle", 10).expect("Search failed.");
		// One document of three contains the term once; lengths are 7, 6 and 4 tokens.
		let idf = ((3.0_f64 - 1.0 + 0.5) / (1.0 + 0.5) + 1.0).ln();
		let avg_len = (7.0 + 6.0 + 4.0) / 3.0;
		let norm = 1.0 - BM25_B + BM25_B * 4.0 / avg_len;
		let expected = idf * (BM25_K1 + 1.0) / (1.0 + BM25_K1 * norm);

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].position, 2);
		assert!((hits[0].score - expected).abs() < 1e-9);
	}

	#[test]
	fn query_without_matches_returns_empty() {
		let hits = sample_index().lexical_search("zzzz", 10).expect("Search failed.");

		assert!(hits.is_empty());
	}

	#[test]
	fn build_rejects_zero_norm_embeddings() {
		let result = CatalogIndex::build(vec![item("z", "Apple", "iPad", vec![0.0, 0.0])], 2);

		assert!(matches!(result, Err(Error::Catalog { .. })));
	}

	#[test]
	fn build_rejects_wrong_dimension() {
		let result = CatalogIndex::build(vec![item("z", "Apple", "iPad", vec![1.0])], 2);

		assert!(result.is_err());
	}
}
