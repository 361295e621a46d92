//! Memoizing embedder wrapper.

use std::sync::Arc;

use dashmap::DashMap;

use super::{EmbedResult, Embedder};

/// Caches embeddings of an inner embedder by exact input text.
///
/// The cache is a `DashMap`, so rayon workers can fill it concurrently
/// (see [`crate::similarity::SimilarityIndex::prefetch`]).
pub struct CachedEmbedder<E> {
    inner: E,
    cache: DashMap<String, Arc<[f32]>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Number of cached texts.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Access the wrapped embedder.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit.value().to_vec());
        }
        let vec = self.inner.embed(text)?;
        self.cache.insert(text.to_owned(), Arc::from(vec.as_slice()));
        Ok(vec)
    }
}

impl<E> std::fmt::Debug for CachedEmbedder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embed::HashingEmbedder;

    struct Counting {
        calls: AtomicUsize,
        inner: HashingEmbedder,
    }

    impl Embedder for Counting {
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.embed(text)
        }
    }

    #[test]
    fn second_lookup_hits_cache() {
        let cached = CachedEmbedder::new(Counting {
            calls: AtomicUsize::new(0),
            inner: HashingEmbedder::new(16),
        });
        let a = cached.embed("autophagy").unwrap();
        let b = cached.embed("autophagy").unwrap();
        assert_eq!(a, b);
        assert_eq!(cached.inner().calls.load(Ordering::Relaxed), 1);
        assert_eq!(cached.cached(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cached = CachedEmbedder::new(HashingEmbedder::new(16));
        assert!(cached.embed(" ").is_err());
        assert_eq!(cached.cached(), 0);
    }

    #[test]
    fn batch_fills_cache() {
        let cached = CachedEmbedder::new(HashingEmbedder::new(16));
        cached.embed_batch(&["a b", "c d", "a b"]).unwrap();
        assert_eq!(cached.cached(), 2);
    }
}
