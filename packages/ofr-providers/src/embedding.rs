use crate::{Error, Result};

/// Deterministic pseudo-embedding of `text`, seeded by its BLAKE3 digest and L2-normalized.
///
/// The same text always maps to the same unit vector, so catalog items and queries embed
/// reproducibly without a model server.
pub fn hash_embedding(text: &str, dim: usize) -> Result<Vec<f32>> {
	if dim == 0 {
		return Err(Error::InvalidConfig {
			message: "Embedding dimension must be greater than zero.".to_string(),
		});
	}

	let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
	let mut bytes = vec![0_u8; dim * 4];

	reader.fill(&mut bytes);

	let mut vec: Vec<f32> = bytes
		.chunks_exact(4)
		.map(|chunk| {
			let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);

			(raw as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
		})
		.collect();
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if !norm.is_finite() || norm <= f32::EPSILON {
		return Err(Error::InvalidResponse {
			message: "Hash embedding collapsed to a zero vector.".to_string(),
		});
	}

	for value in &mut vec {
		*value /= norm;
	}

	Ok(vec)
}

pub fn embed(texts: &[String], dim: usize) -> Result<Vec<Vec<f32>>> {
	texts.iter().map(|text| hash_embedding(text, dim)).collect()
}
