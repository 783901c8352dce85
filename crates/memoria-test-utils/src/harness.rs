// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine harness for integration tests.
//!
//! `TestEngine` assembles a complete engine over in-memory stores and the
//! deterministic mock embedder, so scenario tests can store, recall,
//! link, consolidate, and export without any external service.

use std::sync::Arc;

use memoria_config::{load_config_from_str, MemoriaConfig};
use memoria_core::{EmbeddingProvider, MemoriaError};
use memoria_embedding::{CachingEmbedder, EmbeddingCache};
use memoria_engine::MemoryEngine;
use memoria_storage::Database;
use memoria_vector::VectorStore;

use crate::mock_embedder::MockEmbedder;

/// Builder for test engines with configurable options.
pub struct TestEngineBuilder {
    dimension: usize,
    graph: bool,
    cache: bool,
    min_score: f32,
    chunk_target: usize,
    chunk_overlap: usize,
}

impl TestEngineBuilder {
    fn new() -> Self {
        Self {
            dimension: 64,
            graph: true,
            cache: true,
            min_score: 0.0,
            chunk_target: 500,
            chunk_overlap: 50,
        }
    }

    /// Vector dimension for the mock embedder and store.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Disable the relational graph layer.
    pub fn without_graph(mut self) -> Self {
        self.graph = false;
        self
    }

    /// Disable the embedding cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    /// Recall score floor (defaults to 0.0 so the bag-of-words embedder
    /// does not starve tests of results).
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Chunker geometry.
    pub fn with_chunking(mut self, target_size: usize, overlap: usize) -> Self {
        self.chunk_target = target_size;
        self.chunk_overlap = overlap;
        self
    }

    /// Assemble the engine.
    pub async fn build(self) -> Result<TestEngine, MemoriaError> {
        let config = self.config()?;
        let mock = Arc::new(MockEmbedder::new(self.dimension));
        let cache = if self.cache {
            Some(Arc::new(EmbeddingCache::open_in_memory().await?))
        } else {
            None
        };
        // Same wiring as production: the cache sits in front of the model.
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(CachingEmbedder::new(
            mock.clone(),
            cache.clone(),
            vec![],
        ));
        let vectors = Arc::new(VectorStore::open_in_memory(self.dimension).await?);
        let graph = if self.graph {
            Some(Arc::new(Database::open_in_memory().await?))
        } else {
            None
        };

        let engine = MemoryEngine::with_components(
            config,
            provider,
            cache,
            vectors.clone(),
            graph.clone(),
        )?;
        Ok(TestEngine {
            engine,
            embedder: mock,
            vectors,
            graph,
        })
    }

    fn config(&self) -> Result<MemoriaConfig, MemoriaError> {
        let toml = format!(
            r#"
            [embedding]
            dimension = {dimension}

            [cache]
            enabled = {cache}

            [chunking]
            target_size = {target}
            overlap = {overlap}

            [recall]
            min_score = {min_score}

            [graph]
            enabled = {graph}
            "#,
            dimension = self.dimension,
            cache = self.cache,
            target = self.chunk_target,
            overlap = self.chunk_overlap,
            min_score = self.min_score,
            graph = self.graph,
        );
        load_config_from_str(&toml).map_err(|e| MemoriaError::Config(e.to_string()))
    }
}

/// A complete in-memory engine plus handles to its parts, so tests can
/// inspect physical state (chunk payloads, raw edges) and backdate
/// timestamps for lifecycle scenarios.
pub struct TestEngine {
    pub engine: MemoryEngine,
    pub embedder: Arc<MockEmbedder>,
    pub vectors: Arc<VectorStore>,
    pub graph: Option<Arc<Database>>,
}

impl TestEngine {
    /// Default harness: 64-dim mock embedder, graph and cache enabled,
    /// zero recall score floor.
    pub async fn new() -> Result<Self, MemoriaError> {
        Self::builder().build().await
    }

    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder::new()
    }
}
