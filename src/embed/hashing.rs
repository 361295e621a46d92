//! Deterministic feature-hashing embedder.
//!
//! Labels are normalized, split into words, and each word contributes its
//! character trigrams (with `#` boundary markers) plus the whole word as a
//! feature. Features are hashed into `dimension` buckets with a second hash
//! choosing the sign, then the vector is L2-normalized.
//!
//! Punctuation separates words. A label with no alphanumeric character at
//! all (`"+"`, `"→"`) keeps its symbols as the words instead, so every label
//! with visible text embeds.
//!
//! Hashing uses FNV-1a rather than `DefaultHasher` so vectors are identical
//! across Rust releases and platforms; snapshots rely on rebuilding the
//! similarity index from label text alone.

use crate::error::EmbedError;

use super::{normalize_label, EmbedResult, Embedder};

/// Default vector length.
pub const DEFAULT_DIMENSION: usize = 256;

/// Weight of the whole-word feature relative to one trigram.
const WORD_WEIGHT: f32 = 2.0;

/// Feature-hashing embedder over character trigrams and words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    ///
    /// A zero dimension is bumped to 1 so every vector is well-formed.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, out: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let bucket = (h % self.dimension as u64) as usize;
        // Independent bit for the sign so collisions tend to cancel out.
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let normalized = normalize_label(text);
        let cleaned: String = normalized
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let mut words: Vec<&str> = cleaned.split_whitespace().collect();
        if words.is_empty() {
            words = normalized.split_whitespace().collect();
        }
        if words.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut out = vec![0.0f32; self.dimension];
        for word in &words {
            self.add_feature(&mut out, word, WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut out, &gram, 1.0);
            }
        }

        let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut out {
                *x /= norm;
            }
        }
        Ok(out)
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(PRIME))
}
