//! Similarity index: exact cosine search over embedded entity labels.
//!
//! Every indexed label keeps the ordinal at which it was inserted. Candidate
//! ranking is by descending similarity, ties broken by ascending ordinal, so
//! the earliest-created node wins. The scan is linear in the number of
//! indexed labels, which is fine for tens of thousands of entities. An
//! approximate nearest-neighbor structure can replace it as long as
//! [`SimilarityIndex::find_candidates`] keeps its ranking and threshold
//! semantics.

use std::collections::HashMap;

use crate::embed::{cosine_similarity, EmbedResult, Embedder};
use crate::error::EmbedError;

/// A label that matched a query above the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The indexed label (as indexed, i.e. the embedding key).
    pub key: String,
    /// Cosine similarity to the query.
    pub similarity: f32,
    /// Insertion ordinal of the indexed label.
    pub ordinal: usize,
}

struct Entry {
    key: String,
    vector: Vec<f32>,
}

/// Label embeddings in insertion order, searched by cosine similarity.
pub struct SimilarityIndex {
    embedder: Box<dyn Embedder>,
    entries: Vec<Entry>,
    by_key: HashMap<String, usize>,
}

impl SimilarityIndex {
    /// Create an empty index over the given embedder.
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Add `key` to the index. Idempotent: re-indexing returns the existing ordinal.
    pub fn index(&mut self, key: &str) -> EmbedResult<usize> {
        if let Some(&ordinal) = self.by_key.get(key) {
            return Ok(ordinal);
        }
        let vector = self.embed(key)?;
        Ok(self.insert_embedded(key, vector))
    }

    /// Add `key` with a vector obtained from [`SimilarityIndex::embed`].
    ///
    /// Cannot fail, so callers can embed first and mutate afterwards.
    pub fn insert_embedded(&mut self, key: &str, vector: Vec<f32>) -> usize {
        if let Some(&ordinal) = self.by_key.get(key) {
            return ordinal;
        }
        let ordinal = self.entries.len();
        self.entries.push(Entry {
            key: key.to_owned(),
            vector,
        });
        self.by_key.insert(key.to_owned(), ordinal);
        ordinal
    }

    /// Indexed keys with similarity ≥ `threshold` to `query`, best first.
    pub fn find_candidates(&self, query: &str, threshold: f32) -> EmbedResult<Vec<Candidate>> {
        let q = self.embed(query)?;
        self.candidates_for(&q, threshold)
    }

    /// Like [`SimilarityIndex::find_candidates`] for an already embedded query.
    pub fn candidates_for(&self, query: &[f32], threshold: f32) -> EmbedResult<Vec<Candidate>> {
        let mut out = Vec::new();
        for (ordinal, entry) in self.entries.iter().enumerate() {
            let similarity = cosine_similarity(query, &entry.vector)?;
            if similarity >= threshold {
                out.push(Candidate {
                    key: entry.key.clone(),
                    similarity,
                    ordinal,
                });
            }
        }
        out.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        Ok(out)
    }

    /// The single best candidate, if any clears the threshold.
    pub fn best_match(&self, query: &str, threshold: f32) -> EmbedResult<Option<Candidate>> {
        Ok(self.find_candidates(query, threshold)?.into_iter().next())
    }

    /// Best candidate for an already embedded query.
    pub fn best_match_for(&self, query: &[f32], threshold: f32) -> EmbedResult<Option<Candidate>> {
        Ok(self.candidates_for(query, threshold)?.into_iter().next())
    }

    /// Embed texts on the rayon pool ahead of ingestion.
    ///
    /// Does not touch the index: insertion order is decided by ingest alone.
    /// Only useful when the embedder caches (e.g. [`crate::embed::CachedEmbedder`]).
    pub fn prefetch(&self, texts: &[&str]) -> EmbedResult<()> {
        self.embedder.embed_batch(texts).map(|_| ())
    }

    /// Whether `key` has been indexed.
    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length of the underlying embedder.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Embed `text` without indexing it, checking the vector length.
    pub fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let v = self.embedder.embed(text)?;
        let expected = self.embedder.dimension();
        if v.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: v.len(),
            });
        }
        Ok(v)
    }
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("dimension", &self.embedder.dimension())
            .field("len", &self.entries.len())
            .finish()
    }
}
