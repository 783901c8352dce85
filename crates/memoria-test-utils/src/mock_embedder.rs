// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding provider for tests.
//!
//! Embeds text as a hashed bag-of-words: each lowercased token is hashed
//! into one of D buckets and the resulting count vector is L2-normalized.
//! Texts sharing words get high cosine similarity, identical texts embed
//! identically, and no network or model is involved. The hash is FNV-1a,
//! fixed here so vectors are stable across runs and platforms.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use memoria_core::types::l2_normalize;
use memoria_core::{EmbeddingProvider, EmbeddingRole, MemoriaError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(token: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic bag-of-words embedder.
pub struct MockEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many embed calls reached this provider. Lets tests verify that
    /// the cache short-circuits repeats.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this provider would produce, without counting a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let index = (fnv1a(token) % self.dimension as u64) as usize;
            buckets[index] += 1.0;
        }
        l2_normalize(&buckets)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>, MemoriaError> {
        if text.trim().is_empty() {
            return Err(MemoriaError::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "mock-bag-of-words"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::types::cosine_similarity;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("the deploy script", EmbeddingRole::Document).await.unwrap();
        let b = embedder.embed("the deploy script", EmbeddingRole::Query).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn overlapping_text_scores_higher_than_disjoint() {
        let embedder = MockEmbedder::new(64);
        let base = embedder.vector_for("deploy script runs in production");
        let close = embedder.vector_for("the deploy script for production");
        let far = embedder.vector_for("quantum chromodynamics lattice");

        assert!(
            cosine_similarity(&base, &close) > cosine_similarity(&base, &far),
            "shared words must increase similarity"
        );
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let embedder = MockEmbedder::new(32);
        let v = embedder.vector_for("a few words here");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let embedder = MockEmbedder::new(32);
        assert!(embedder.embed("  ", EmbeddingRole::Query).await.is_err());
    }
}
