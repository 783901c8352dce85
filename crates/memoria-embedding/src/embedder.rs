// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caching layer in front of an embedding provider.
//!
//! Cache keys are computed over the *normalized* text: outer whitespace and
//! any known role prefix are stripped, so a query and a document embedding
//! of the same normalized text share one entry. Identical normalized input
//! with identical model configuration never reaches the model twice.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use memoria_core::{EmbeddingProvider, EmbeddingRole, MemoriaError};

use crate::cache::EmbeddingCache;

/// An [`EmbeddingProvider`] that consults a persistent cache before
/// delegating to the wrapped provider.
pub struct CachingEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
    /// Every prefix any configured model might have prepended; stripped
    /// during normalization.
    known_prefixes: Vec<String>,
}

impl CachingEmbedder {
    pub fn new(
        inner: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<EmbeddingCache>>,
        known_prefixes: Vec<String>,
    ) -> Self {
        let known_prefixes = known_prefixes
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            inner,
            cache,
            known_prefixes,
        }
    }

    /// Strip outer whitespace and any known role prefix. Internal whitespace
    /// is preserved.
    fn normalize<'a>(&self, text: &'a str) -> &'a str {
        let mut t = text.trim();
        for prefix in &self.known_prefixes {
            if let Some(rest) = t.strip_prefix(prefix.as_str()) {
                t = rest.trim_start();
                break;
            }
        }
        t
    }

    /// Access to the underlying cache, if enabled.
    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }
}

#[async_trait]
impl EmbeddingProvider for CachingEmbedder {
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, MemoriaError> {
        if text.trim().is_empty() {
            return Err(MemoriaError::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }

        let normalized = self.normalize(text).to_string();
        let model = self.inner.model_id().to_string();
        let dimension = self.inner.dimension();

        if let Some(cache) = &self.cache {
            match cache.get(&normalized, &model, dimension).await {
                Ok(Some(vector)) => return Ok(vector),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "embedding cache read failed"),
            }
        }

        let vector = self.inner.embed(text, role).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&normalized, &model, dimension, &vector).await {
                // A failed write only costs a future recompute.
                warn!(error = %e, "embedding cache write failed");
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts model calls; returns a fixed-pattern vector per text length.
    struct CountingProvider {
        calls: AtomicUsize,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(
            &self,
            text: &str,
            _role: EmbeddingRole,
        ) -> Result<Vec<f32>, MemoriaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = text.trim().len() as f32;
            Ok((0..self.dimension).map(|i| seed + i as f32).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            "counting-model"
        }
    }

    async fn caching(prefixes: Vec<String>) -> (Arc<CountingProvider>, CachingEmbedder) {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dimension: 4,
        });
        let cache = Arc::new(EmbeddingCache::open_in_memory().await.unwrap());
        let embedder = CachingEmbedder::new(inner.clone(), Some(cache), prefixes);
        (inner, embedder)
    }

    #[tokio::test]
    async fn second_identical_call_skips_the_model() {
        let (inner, embedder) = caching(vec![]).await;

        let first = embedder.embed("hello world", EmbeddingRole::Document).await.unwrap();
        let second = embedder.embed("hello world", EmbeddingRole::Document).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn normalization_strips_outer_whitespace() {
        let (inner, embedder) = caching(vec![]).await;

        embedder.embed("hello", EmbeddingRole::Document).await.unwrap();
        embedder.embed("  hello  ", EmbeddingRole::Document).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn normalization_strips_role_prefix() {
        let (inner, embedder) = caching(vec!["search_query: ".into()]).await;

        embedder.embed("hello", EmbeddingRole::Document).await.unwrap();
        embedder
            .embed("search_query: hello", EmbeddingRole::Query)
            .await
            .unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_text_misses() {
        let (inner, embedder) = caching(vec![]).await;

        embedder.embed("alpha", EmbeddingRole::Document).await.unwrap();
        embedder.embed("gamma!", EmbeddingRole::Document).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_calls_through() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dimension: 4,
        });
        let embedder = CachingEmbedder::new(inner.clone(), None, vec![]);

        embedder.embed("hello", EmbeddingRole::Document).await.unwrap();
        embedder.embed("hello", EmbeddingRole::Document).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let (_, embedder) = caching(vec![]).await;
        let err = embedder.embed("", EmbeddingRole::Query).await.unwrap_err();
        assert!(matches!(err, MemoriaError::InvalidInput(_)));
    }
}
