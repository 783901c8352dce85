// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine façade: store, recall, search, update, delete.
//!
//! Mutations on one memory id are serialized through the per-id lock
//! table; recall and search take no locks. No lock is ever held across a
//! failure path without compensation: a failed store deletes the chunks it
//! wrote, and if that also fails the id lands on the repair queue drained
//! by the next maintenance pass.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use memoria_config::MemoriaConfig;
use memoria_core::types::{MemoryCategory, MemoryRecord, Metadata, ScoredMemory};
use memoria_core::{EmbeddingProvider, EmbeddingRole, MemoriaError};
use memoria_embedding::{CachingEmbedder, Chunker, EmbeddingCache, HttpEmbedder};
use memoria_storage::Database;
use memoria_vector::{ChunkPayload, CollectionStats, Point, SearchHit, VectorStore};

use crate::context::WorkingContext;
use crate::locks::LockTable;
use crate::options::{
    DeleteTarget, RecallOptions, RecallResponse, SearchOptions, SortBy, StoreOptions,
    UpdateOptions,
};

/// Aggregate engine statistics for diagnostics.
#[derive(Debug)]
pub struct EngineStats {
    pub collections: Vec<(MemoryCategory, CollectionStats)>,
    pub total_memories: usize,
    pub total_points: usize,
    pub edges: Option<usize>,
    pub rejections: Option<usize>,
    pub cache: Option<memoria_embedding::CacheStats>,
    pub model: String,
    pub dimension: usize,
}

/// The persistent memory engine.
pub struct MemoryEngine {
    pub(crate) config: MemoriaConfig,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) cache: Option<Arc<EmbeddingCache>>,
    pub(crate) vectors: Arc<VectorStore>,
    pub(crate) graph: Option<Arc<Database>>,
    pub(crate) chunker: Chunker,
    pub(crate) locks: LockTable,
    pub(crate) context: RwLock<WorkingContext>,
    /// Exclusive lease: one maintenance operation at a time.
    pub(crate) maintenance: tokio::sync::Mutex<()>,
    /// Memory ids whose compensation failed; cleaned by reconciliation.
    pub(crate) repair_queue: StdMutex<Vec<Uuid>>,
    pub(crate) default_category: MemoryCategory,
}

impl MemoryEngine {
    /// Wire up the full engine from configuration: HTTP embedder with
    /// persistent cache, vector store, and (unless disabled) the graph
    /// database, all under `storage.data_dir`.
    pub async fn open(config: MemoriaConfig) -> Result<Self, MemoriaError> {
        let data_dir = PathBuf::from(&config.storage.data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| MemoriaError::Storage { source: Box::new(e) })?;

        let cache = if config.cache.enabled {
            Some(Arc::new(
                EmbeddingCache::open(&data_dir.join("cache.db")).await?,
            ))
        } else {
            None
        };

        let client = Arc::new(HttpEmbedder::new(&config.embedding)?);
        let known_prefixes: Vec<String> = config
            .embedding
            .role_prefixes
            .values()
            .flat_map(|p| [p.query.clone(), p.document.clone()])
            .filter(|p| !p.is_empty())
            .collect();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CachingEmbedder::new(
            client,
            cache.clone(),
            known_prefixes,
        ));

        let vectors = Arc::new(
            VectorStore::open(&data_dir.join("vectors.db"), config.embedding.dimension).await?,
        );
        let graph = if config.graph.enabled {
            Some(Arc::new(
                Database::open(&data_dir.join("graph.db"), config.storage.wal_mode).await?,
            ))
        } else {
            None
        };

        let engine = Self::with_components(config, embedder, cache, vectors, graph)?;
        // Startup drift scan; findings are repaired and logged, never fatal.
        if let Err(e) = engine.reconcile().await {
            warn!(error = %e, "startup reconciliation failed");
        }
        Ok(engine)
    }

    /// Assemble an engine from pre-built components. Used by tests and by
    /// callers that substitute their own embedding provider.
    pub fn with_components(
        config: MemoriaConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Option<Arc<EmbeddingCache>>,
        vectors: Arc<VectorStore>,
        graph: Option<Arc<Database>>,
    ) -> Result<Self, MemoriaError> {
        if embedder.dimension() != vectors.dimension() {
            return Err(MemoriaError::Config(format!(
                "embedder dimension {} does not match vector store dimension {}",
                embedder.dimension(),
                vectors.dimension()
            )));
        }
        let default_category = MemoryCategory::parse(&config.engine.default_category)
            .map_err(|e| MemoriaError::Config(e.to_string()))?;
        let chunker = Chunker::new(config.chunking.target_size, config.chunking.overlap);
        Ok(Self {
            config,
            embedder,
            cache,
            vectors,
            graph,
            chunker,
            locks: LockTable::new(),
            context: RwLock::new(WorkingContext::default()),
            maintenance: tokio::sync::Mutex::new(()),
            repair_queue: StdMutex::new(Vec::new()),
            default_category,
        })
    }

    /// The graph database, or `NotAvailable` when disabled.
    pub(crate) fn graph_db(&self) -> Result<&Arc<Database>, MemoriaError> {
        self.graph.as_ref().ok_or(MemoriaError::NotAvailable("graph"))
    }

    /// Ingest a new memory. Returns its id.
    pub async fn store(
        &self,
        content: &str,
        options: StoreOptions,
    ) -> Result<Uuid, MemoriaError> {
        if content.trim().is_empty() {
            return Err(MemoriaError::InvalidInput("content must not be empty".into()));
        }
        let importance = options.importance.unwrap_or(0.5);
        if !(0.0..=1.0).contains(&importance) {
            return Err(MemoriaError::InvalidInput(format!(
                "importance {importance} outside [0, 1]"
            )));
        }
        let category = options.category.unwrap_or(self.default_category);

        let mut metadata = options.metadata;
        self.context.read().await.merge_into(&mut metadata);

        let memory_id = Uuid::new_v4();
        let _guard = self.locks.lock(memory_id).await;

        let points = self
            .embed_chunks(
                memory_id,
                content,
                category,
                options.tags,
                importance,
                metadata,
                Utc::now(),
            )
            .await?;

        if let Err(e) = self.vectors.upsert(category, points).await {
            self.compensate_store(category, memory_id).await;
            return Err(e);
        }

        info!(%memory_id, category = category.as_str(), "stored memory");
        Ok(memory_id)
    }

    /// Chunk, embed (document role), and assemble the points of one memory.
    /// Chunk 0 carries the full original content.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn embed_chunks(
        &self,
        memory_id: Uuid,
        content: &str,
        category: MemoryCategory,
        tags: Vec<String>,
        importance: f64,
        metadata: Metadata,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Point>, MemoriaError> {
        let chunks: Vec<_> = self.chunker.split(content).collect();
        let chunk_count = chunks.len() as u32;
        let now = Utc::now();

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self
                .embedder
                .embed(&chunk.text, EmbeddingRole::Document)
                .await?;
            let chunk_content = if chunk.index == 0 {
                content.to_string()
            } else {
                chunk.text.clone()
            };
            points.push(Point {
                id: Uuid::new_v4(),
                vector,
                payload: ChunkPayload {
                    memory_id,
                    chunk_index: chunk.index as u32,
                    chunk_count,
                    content: chunk_content,
                    tags: tags.clone(),
                    importance,
                    category,
                    created_at,
                    updated_at: now,
                    last_accessed_at: now,
                    access_count: 0,
                    metadata: metadata.clone(),
                },
            });
        }
        Ok(points)
    }

    /// Best-effort removal of chunks written before a failed upsert.
    async fn compensate_store(&self, category: MemoryCategory, memory_id: Uuid) {
        if let Err(e) = self.vectors.delete_memory(category, memory_id).await {
            warn!(%memory_id, error = %e, "store compensation failed, queueing for repair");
            if let Ok(mut queue) = self.repair_queue.lock() {
                queue.push(memory_id);
            }
        }
    }

    /// Semantic retrieval. Dedups chunks to logical memories by max score,
    /// reconstructs full content from chunk 0, and bumps access tracking on
    /// every returned memory.
    pub async fn recall(
        &self,
        query: &str,
        options: RecallOptions,
    ) -> Result<RecallResponse, MemoriaError> {
        let limit = options.limit.unwrap_or(self.config.recall.default_limit);
        if limit == 0 {
            return Ok(RecallResponse { results: vec![], partial: false });
        }
        let min_score = options.min_score.unwrap_or(self.config.recall.min_score);
        let overfetch = self.config.recall.overfetch_factor.max(3) * limit;

        let query_vec = self.embedder.embed(query, EmbeddingRole::Query).await?;
        let categories = options
            .categories
            .unwrap_or_else(|| MemoryCategory::ALL.to_vec());

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut failed = 0usize;
        let mut last_err = None;
        for &category in &categories {
            match self
                .vectors
                .search(category, &query_vec, overfetch, options.filter.as_ref())
                .await
            {
                Ok(batch) => hits.extend(batch),
                Err(e) => {
                    warn!(category = category.as_str(), error = %e, "recall skipped category");
                    failed += 1;
                    last_err = Some(e);
                }
            }
        }
        if failed == categories.len() {
            return Err(last_err
                .unwrap_or_else(|| MemoriaError::InvalidInput("no categories requested".into())));
        }
        let partial = failed > 0;

        if let Some(needle) = &options.text_match {
            let needle = needle.to_lowercase();
            hits.retain(|hit| hit.payload.content.to_lowercase().contains(&needle));
        }

        // Dedup by memory id keeping the best-scoring chunk.
        let mut best: Vec<SearchHit> = Vec::new();
        for hit in hits {
            match best
                .iter_mut()
                .find(|b| b.payload.memory_id == hit.payload.memory_id)
            {
                Some(existing) => {
                    if hit.score > existing.score {
                        *existing = hit;
                    }
                }
                None => best.push(hit),
            }
        }

        let mut results = Vec::new();
        for hit in best {
            if hit.score < min_score {
                continue;
            }
            let record = match self.resolve_record(&hit).await? {
                Some(record) => record,
                None => continue, // orphan chunks; reconciliation cleans up
            };
            results.push(ScoredMemory {
                memory: record,
                score: hit.score,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        results.truncate(limit);

        for scored in &mut results {
            self.touch_access(&mut scored.memory).await;
        }

        Ok(RecallResponse { results, partial })
    }

    /// Full record for a hit: directly if the hit is chunk 0, otherwise via
    /// the memory's chunk 0. Returns `None` when chunk 0 is missing (drift).
    async fn resolve_record(&self, hit: &SearchHit) -> Result<Option<MemoryRecord>, MemoriaError> {
        if hit.payload.chunk_index == 0 {
            return Ok(Some(hit.payload.to_record()));
        }
        let zero = self
            .vectors
            .chunk_zero(hit.payload.category, hit.payload.memory_id)
            .await?;
        match zero {
            Some(point) => Ok(Some(point.payload.to_record())),
            None => {
                warn!(
                    memory_id = %hit.payload.memory_id,
                    "chunk 0 missing for recalled memory"
                );
                Ok(None)
            }
        }
    }

    /// Bump access count and last-accessed time on every chunk of a
    /// returned memory, keeping the chunks homogeneous. Best effort: a
    /// failed touch never fails the recall.
    async fn touch_access(&self, record: &mut MemoryRecord) {
        let now = Utc::now();
        record.access_count += 1;
        record.last_accessed_at = now;

        let result = async {
            let mut chunks = self.vectors.chunks_of(record.category, record.id).await?;
            for chunk in &mut chunks {
                chunk.payload.access_count += 1;
                chunk.payload.last_accessed_at = now;
            }
            self.vectors.upsert(record.category, chunks).await
        }
        .await;
        if let Err(e) = result {
            warn!(memory_id = %record.id, error = %e, "failed to record memory access");
        }
    }

    /// Search with optional semantic query. Without a query, results come
    /// from a filtered scroll ranked by `sort_by` alone.
    pub async fn search(
        &self,
        options: SearchOptions,
    ) -> Result<Vec<ScoredMemory>, MemoriaError> {
        let limit = options.limit.unwrap_or(self.config.recall.default_limit);

        let mut results = match &options.query {
            Some(query) => {
                self.recall(
                    query,
                    RecallOptions {
                        categories: options.categories.clone(),
                        limit: Some(limit),
                        min_score: None,
                        text_match: options.text_match.clone(),
                        filter: options.filter.clone(),
                    },
                )
                .await?
                .results
            }
            None => {
                let categories = options
                    .categories
                    .clone()
                    .unwrap_or_else(|| MemoryCategory::ALL.to_vec());
                let mut collected = Vec::new();
                for &category in &categories {
                    let mut cursor = None;
                    loop {
                        let (page, next) = self
                            .vectors
                            .scroll(category, options.filter.as_ref(), cursor, 200)
                            .await?;
                        for point in page {
                            if point.payload.chunk_index != 0 {
                                continue;
                            }
                            if let Some(needle) = &options.text_match {
                                if !point
                                    .payload
                                    .content
                                    .to_lowercase()
                                    .contains(&needle.to_lowercase())
                                {
                                    continue;
                                }
                            }
                            collected.push(ScoredMemory {
                                memory: point.payload.to_record(),
                                score: 1.0,
                            });
                        }
                        match next {
                            Some(c) => cursor = Some(c),
                            None => break,
                        }
                    }
                }
                collected
            }
        };

        match options.sort_by {
            SortBy::Relevance => {} // recall already ranked; scroll keeps date order below
            SortBy::Date => {
                results.sort_by(|a, b| b.memory.created_at.cmp(&a.memory.created_at))
            }
            SortBy::Importance => results.sort_by(|a, b| {
                b.memory
                    .importance
                    .partial_cmp(&a.memory.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            SortBy::AccessCount => {
                results.sort_by(|a, b| b.memory.access_count.cmp(&a.memory.access_count))
            }
        }
        if options.query.is_none() && options.sort_by == SortBy::Relevance {
            // No semantic signal to rank by; newest first is the useful order.
            results.sort_by(|a, b| b.memory.created_at.cmp(&a.memory.created_at));
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Fetch one memory by id, or `None` if it does not exist.
    pub async fn get(&self, memory_id: Uuid) -> Result<Option<MemoryRecord>, MemoriaError> {
        let Some(category) = self.vectors.find_memory(memory_id).await? else {
            return Ok(None);
        };
        let zero = self.vectors.chunk_zero(category, memory_id).await?;
        Ok(zero.map(|point| point.payload.to_record()))
    }

    /// Update a memory in place. Content changes rewrite every chunk under
    /// the same id; payload-only changes patch every chunk.
    pub async fn update(
        &self,
        memory_id: Uuid,
        options: UpdateOptions,
    ) -> Result<MemoryRecord, MemoriaError> {
        if let Some(importance) = options.importance {
            if !(0.0..=1.0).contains(&importance) {
                return Err(MemoriaError::InvalidInput(format!(
                    "importance {importance} outside [0, 1]"
                )));
            }
        }

        let _guard = self.locks.lock(memory_id).await;

        let Some(category) = self.vectors.find_memory(memory_id).await? else {
            return Err(MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            });
        };
        let mut chunks = self.vectors.chunks_of(category, memory_id).await?;
        let base = chunks
            .iter()
            .find(|c| c.payload.chunk_index == 0)
            .ok_or_else(|| MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            })?
            .payload
            .clone();

        let now = Utc::now();
        let tags = options.tags.unwrap_or_else(|| base.tags.clone());
        let importance = options.importance.unwrap_or(base.importance);
        let mut metadata = base.metadata.clone();
        if let Some(patch) = &options.metadata {
            apply_metadata_patch(&mut metadata, patch);
        }

        let content_changed = options
            .content
            .as_ref()
            .is_some_and(|c| c != &base.content);

        if content_changed {
            let content = options.content.as_deref().unwrap_or_default();
            if content.trim().is_empty() {
                return Err(MemoriaError::InvalidInput("content must not be empty".into()));
            }
            // Embed the replacement before touching stored state.
            let mut points = self
                .embed_chunks(
                    memory_id,
                    content,
                    category,
                    tags,
                    importance,
                    metadata,
                    base.created_at,
                )
                .await?;
            for point in &mut points {
                point.payload.updated_at = now;
                point.payload.last_accessed_at = base.last_accessed_at;
                point.payload.access_count = base.access_count;
            }
            self.vectors.delete_memory(category, memory_id).await?;
            if let Err(e) = self.vectors.upsert(category, points).await {
                self.compensate_store(category, memory_id).await;
                return Err(e);
            }
        } else {
            for chunk in &mut chunks {
                chunk.payload.tags = tags.clone();
                chunk.payload.importance = importance;
                chunk.payload.metadata = metadata.clone();
                chunk.payload.updated_at = now;
            }
            self.vectors.upsert(category, chunks).await?;
        }

        debug!(%memory_id, content_changed, "updated memory");
        let zero = self.vectors.chunk_zero(category, memory_id).await?;
        zero.map(|point| point.payload.to_record())
            .ok_or_else(|| MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            })
    }

    /// Delete memories. Unknown ids are a no-op. Edges go first, then
    /// chunks, so a failure between the two leaves nothing dangling that
    /// reconciliation cannot find. Returns the number of memories removed.
    pub async fn delete(&self, target: DeleteTarget) -> Result<usize, MemoriaError> {
        let ids = match target {
            DeleteTarget::Id(id) => vec![id],
            DeleteTarget::Ids(ids) => ids,
            DeleteTarget::Filter { categories, filter } => {
                let categories =
                    categories.unwrap_or_else(|| MemoryCategory::ALL.to_vec());
                let mut ids = Vec::new();
                for &category in &categories {
                    let mut cursor = None;
                    loop {
                        let (page, next) = self
                            .vectors
                            .scroll(category, Some(&filter), cursor, 200)
                            .await?;
                        ids.extend(
                            page.iter()
                                .filter(|p| p.payload.chunk_index == 0)
                                .map(|p| p.payload.memory_id),
                        );
                        match next {
                            Some(c) => cursor = Some(c),
                            None => break,
                        }
                    }
                }
                ids
            }
        };

        let mut removed = 0;
        for id in ids {
            let _guard = self.locks.lock(id).await;
            let Some(category) = self.vectors.find_memory(id).await? else {
                continue; // delete of unknown id is not an error
            };
            if let Some(db) = &self.graph {
                memoria_storage::queries::relations::delete_for_memory(db, id).await?;
            }
            let chunks_removed = self.vectors.delete_memory(category, id).await?;
            if chunks_removed > 0 {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "deleted memories");
        }
        Ok(removed)
    }

    /// Replace the working context applied to subsequent stores.
    pub async fn set_context(&self, context: WorkingContext) {
        *self.context.write().await = context;
    }

    /// Clear the working context.
    pub async fn clear_context(&self) {
        *self.context.write().await = WorkingContext::default();
    }

    /// The current working context.
    pub async fn current_context(&self) -> WorkingContext {
        self.context.read().await.clone()
    }

    /// Aggregate statistics for the status command.
    pub async fn stats(&self) -> Result<EngineStats, MemoriaError> {
        let mut collections = Vec::new();
        let mut total_points = 0;
        let mut total_memories = 0;
        for category in MemoryCategory::ALL {
            let stats = self.vectors.stats(category).await?;
            total_points += stats.points;
            total_memories += stats.memories;
            collections.push((category, stats));
        }

        let (edges, rejections) = match &self.graph {
            Some(db) => (
                Some(
                    memoria_storage::queries::relations::all_edges(db)
                        .await?
                        .len(),
                ),
                Some(
                    memoria_storage::queries::rejections::all_rejections(db)
                        .await?
                        .len(),
                ),
            ),
            None => (None, None),
        };

        let cache = match &self.cache {
            Some(cache) => Some(cache.stats().await?),
            None => None,
        };

        Ok(EngineStats {
            collections,
            total_memories,
            total_points,
            edges,
            rejections,
            cache,
            model: self.embedder.model_id().to_string(),
            dimension: self.embedder.dimension(),
        })
    }
}

/// Key-wise metadata merge: the patch overwrites, JSON `null` removes.
pub(crate) fn apply_metadata_patch(base: &mut Metadata, patch: &Metadata) {
    for (key, value) in patch {
        if value.is_null() {
            base.remove(key);
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_patch_overwrites_and_removes() {
        let mut base = Metadata::new();
        base.insert("project".into(), json!("old"));
        base.insert("client".into(), json!("acme"));

        let mut patch = Metadata::new();
        patch.insert("project".into(), json!("new"));
        patch.insert("client".into(), serde_json::Value::Null);
        patch.insert("file".into(), json!("src/main.rs"));

        apply_metadata_patch(&mut base, &patch);
        assert_eq!(base.get("project"), Some(&json!("new")));
        assert!(!base.contains_key("client"));
        assert_eq!(base.get("file"), Some(&json!("src/main.rs")));
    }

    #[test]
    fn metadata_patch_is_idempotent() {
        let mut base = Metadata::new();
        base.insert("a".into(), json!(1));

        let mut patch = Metadata::new();
        patch.insert("a".into(), json!(2));
        patch.insert("b".into(), json!("x"));

        apply_metadata_patch(&mut base, &patch);
        let once = base.clone();
        apply_metadata_patch(&mut base, &patch);
        assert_eq!(base, once);
    }
}
