//! Entity embedding: mapping entity labels to fixed-length vectors.
//!
//! The [`Embedder`] trait is the contract the similarity index consumes.
//! Model-backed embedders (sentence transformers behind an HTTP service,
//! ONNX, ...) implement it outside this crate. Two implementations ship here:
//!
//! - [`HashingEmbedder`]: deterministic character n-gram feature hashing,
//!   needs no model and is stable across runs and platforms
//! - [`CachedEmbedder`]: memoizes any embedder in a concurrent map

pub mod cache;
pub mod hashing;

use unicode_normalization::UnicodeNormalization;

use crate::error::EmbedError;

pub use cache::CachedEmbedder;
pub use hashing::HashingEmbedder;

/// Result type for embedding operations.
pub type EmbedResult<T> = std::result::Result<T, EmbedError>;

/// Maps text to a fixed-length numeric vector.
///
/// Implementations must be pure functions of the input text: the same text
/// always yields the same vector. Resolution determinism depends on it.
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single piece of text.
    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Embed many texts. The default runs [`Embedder::embed`] on the rayon pool.
    fn embed_batch(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        texts.par_iter().map(|t| self.embed(t)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Cosine similarity of two vectors. Returns 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> EmbedResult<f32> {
    if a.len() != b.len() {
        return Err(EmbedError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / denom) as f32)
}

/// Canonical comparison key for a label: NFKC, lowercase, single spaces.
///
/// Used by exact-match resolution and as the first step of hashing.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
