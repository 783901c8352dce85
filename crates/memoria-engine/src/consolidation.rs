// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle maintenance: merging near-duplicates, forgetting unused
//! memories, and importance decay.
//!
//! All three operations take the engine's exclusive maintenance lease and
//! support `dry_run`, in which case nothing is committed and the report
//! counts describe what would have changed.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use memoria_core::types::{cosine_similarity, tag_key, MemoryCategory, Metadata};
use memoria_core::MemoriaError;
use memoria_storage::queries::relations::{
    delete_edge, get_edge, insert_edge, list_edges, update_edge_weight,
};
use memoria_vector::{PayloadFilter, Point};

use crate::manager::MemoryEngine;
use crate::options::{ConsolidateOptions, ConsolidationReport, DecayOptions, ForgetOptions};

impl MemoryEngine {
    /// Merge near-duplicate memories within one category.
    ///
    /// Memories are processed in ascending `created_at` order (ties by id),
    /// so the merge survivor is always the earliest-created memory. Only
    /// memories at least `min_importance` important and at most
    /// `max_age_days` old participate.
    pub async fn consolidate(
        &self,
        category: MemoryCategory,
        options: ConsolidateOptions,
    ) -> Result<ConsolidationReport, MemoriaError> {
        if !self.config.consolidation.enabled {
            return Err(MemoriaError::NotAvailable("consolidation"));
        }
        let _lease = self.maintenance.lock().await;
        let start = Instant::now();

        let threshold = options
            .similarity_threshold
            .unwrap_or(self.config.consolidation.similarity_threshold);
        let min_importance = options
            .min_importance
            .unwrap_or(self.config.consolidation.min_importance);
        let max_age_days = options
            .max_age_days
            .unwrap_or(self.config.consolidation.max_age_days);
        let oldest_eligible = Utc::now() - ChronoDuration::days(max_age_days);

        let mut candidates = self.collect_chunk_zeros(category).await?;
        candidates.retain(|point| {
            point.payload.importance >= min_importance
                && point.payload.created_at >= oldest_eligible
        });
        candidates.sort_by(|a, b| {
            a.payload
                .created_at
                .cmp(&b.payload.created_at)
                .then_with(|| {
                    a.payload
                        .memory_id
                        .to_string()
                        .cmp(&b.payload.memory_id.to_string())
                })
        });
        let total_processed = candidates.len();

        let mut survivors: Vec<Point> = Vec::new();
        let mut merged_count = 0usize;

        for candidate in candidates {
            let absorbed_by = survivors.iter().position(|kept| {
                cosine_similarity(&kept.vector, &candidate.vector) as f64 >= threshold
            });
            match absorbed_by {
                Some(index) => {
                    merged_count += 1;
                    if !options.dry_run {
                        let survivor = survivors[index].clone();
                        let new_zero = self.merge_pair(category, &survivor, &candidate).await?;
                        survivors[index] = new_zero;
                    }
                }
                None => survivors.push(candidate),
            }
        }

        if !options.dry_run {
            self.prune_cache_after_maintenance().await;
        }
        info!(
            category = category.as_str(),
            merged_count,
            dry_run = options.dry_run,
            "consolidation pass finished"
        );
        Ok(ConsolidationReport {
            operation: "consolidate",
            merged_count,
            forgotten_count: 0,
            updated_count: 0,
            total_processed,
            duration: start.elapsed(),
            is_preview: options.dry_run,
        })
    }

    /// Merge `absorbed` into `survivor`: combine payloads, re-home edges,
    /// rewrite the survivor's chunks from the combined content, and delete
    /// the absorbed memory. Returns the survivor's new chunk 0.
    async fn merge_pair(
        &self,
        category: MemoryCategory,
        survivor: &Point,
        absorbed: &Point,
    ) -> Result<Point, MemoriaError> {
        let survivor_id = survivor.payload.memory_id;
        let absorbed_id = absorbed.payload.memory_id;
        let _guards = self.locks.lock_pair(survivor_id, absorbed_id).await;

        let s = &survivor.payload;
        let a = &absorbed.payload;
        let combined = merge_contents(&s.content, &a.content);
        let tags = merge_tags(&s.tags, &a.tags);
        let importance = s.importance.max(a.importance);
        let access_count = s.access_count + a.access_count;
        let created_at = s.created_at.min(a.created_at);
        let last_accessed_at = s.last_accessed_at.max(a.last_accessed_at);
        let metadata = merge_metadata_deep(&s.metadata, &a.metadata);

        // Relational first: every edge of the absorbed memory must survive
        // on the survivor before the absorbed chunks disappear.
        if let Some(db) = &self.graph {
            redirect_edges(db, absorbed_id, survivor_id).await?;
        }

        let now = Utc::now();
        let mut points = self
            .embed_chunks(
                survivor_id,
                &combined,
                category,
                tags,
                importance,
                metadata,
                created_at,
            )
            .await?;
        for point in &mut points {
            point.payload.updated_at = now;
            point.payload.last_accessed_at = last_accessed_at;
            point.payload.access_count = access_count;
        }
        let new_zero = points
            .iter()
            .find(|p| p.payload.chunk_index == 0)
            .cloned()
            .ok_or_else(|| MemoriaError::Internal("merge produced no chunk 0".into()))?;

        self.vectors.delete_memory(category, absorbed_id).await?;
        self.vectors.delete_memory(category, survivor_id).await?;
        self.vectors.upsert(category, points).await?;

        debug!(%absorbed_id, %survivor_id, "merged memories");
        Ok(new_zero)
    }

    /// Delete memories that are old, unused, unimportant, and unlinked.
    pub async fn forget(
        &self,
        category: MemoryCategory,
        options: ForgetOptions,
    ) -> Result<ConsolidationReport, MemoriaError> {
        let _lease = self.maintenance.lock().await;
        let start = Instant::now();

        let max_age_days = options
            .max_age_days
            .unwrap_or(self.config.consolidation.max_age_days);
        let min_importance = options
            .min_importance
            .unwrap_or(self.config.consolidation.min_importance);
        let cutoff = Utc::now() - ChronoDuration::days(max_age_days);

        let zeros = self.collect_chunk_zeros(category).await?;
        let total_processed = zeros.len();
        let mut candidates = Vec::new();
        for point in zeros {
            let p = &point.payload;
            if p.last_accessed_at >= cutoff
                || p.importance >= min_importance
                || p.access_count != 0
            {
                continue;
            }
            if let Some(db) = &self.graph {
                let counts =
                    memoria_storage::queries::relations::count_relations(db, p.memory_id)
                        .await?;
                if counts.total() > 0 {
                    continue;
                }
            }
            candidates.push(p.memory_id);
        }

        let forgotten_count = candidates.len();
        if !options.dry_run {
            for memory_id in candidates {
                let _guard = self.locks.lock(memory_id).await;
                if let Some(db) = &self.graph {
                    memoria_storage::queries::relations::delete_for_memory(db, memory_id)
                        .await?;
                }
                self.vectors.delete_memory(category, memory_id).await?;
            }
            self.prune_cache_after_maintenance().await;
        }

        info!(
            category = category.as_str(),
            forgotten_count,
            dry_run = options.dry_run,
            "forgetting pass finished"
        );
        Ok(ConsolidationReport {
            operation: "forget",
            merged_count: 0,
            forgotten_count,
            updated_count: 0,
            total_processed,
            duration: start.elapsed(),
            is_preview: options.dry_run,
        })
    }

    /// Halve importance per `half_life_days` of inactivity, clamped to
    /// [0, 1]. Touches `updated_at` on decayed memories.
    pub async fn decay(
        &self,
        category: MemoryCategory,
        options: DecayOptions,
    ) -> Result<ConsolidationReport, MemoriaError> {
        if options.half_life_days <= 0 {
            return Err(MemoriaError::InvalidInput(
                "half_life_days must be positive".into(),
            ));
        }
        let _lease = self.maintenance.lock().await;
        let start = Instant::now();

        let now = Utc::now();
        let half_life = options.half_life_days as f64;
        let zeros = self.collect_chunk_zeros(category).await?;
        let total_processed = zeros.len();
        let mut updated_count = 0usize;

        for point in zeros {
            let p = &point.payload;
            let age_days =
                (now - p.last_accessed_at).num_seconds() as f64 / 86_400.0;
            if age_days <= half_life {
                continue;
            }
            let decayed =
                (p.importance * 0.5_f64.powf(age_days / half_life)).clamp(0.0, 1.0);
            if (p.importance - decayed).abs() < 1e-9 {
                continue;
            }
            updated_count += 1;
            if options.dry_run {
                continue;
            }

            let memory_id = p.memory_id;
            let _guard = self.locks.lock(memory_id).await;
            let mut chunks = self.vectors.chunks_of(category, memory_id).await?;
            for chunk in &mut chunks {
                chunk.payload.importance = decayed;
                chunk.payload.updated_at = now;
            }
            self.vectors.upsert(category, chunks).await?;
        }

        if !options.dry_run {
            self.prune_cache_after_maintenance().await;
        }
        info!(
            category = category.as_str(),
            updated_count,
            dry_run = options.dry_run,
            "decay pass finished"
        );
        Ok(ConsolidationReport {
            operation: "decay",
            merged_count: 0,
            forgotten_count: 0,
            updated_count,
            total_processed,
            duration: start.elapsed(),
            is_preview: options.dry_run,
        })
    }

    /// All chunk-0 points of one category, with vectors.
    pub(crate) async fn collect_chunk_zeros(
        &self,
        category: MemoryCategory,
    ) -> Result<Vec<Point>, MemoriaError> {
        let filter = PayloadFilter::new().equals("chunk_index", 0);
        let mut zeros = Vec::new();
        let mut cursor = None;
        loop {
            let (page, next) = self
                .vectors
                .scroll(category, Some(&filter), cursor, 200)
                .await?;
            zeros.extend(page);
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
            tokio::task::yield_now().await; // stay cooperative between batches
        }
        Ok(zeros)
    }

    /// Enforce the configured cache bound after a maintenance pass.
    pub(crate) async fn prune_cache_after_maintenance(&self) {
        let max_entries = self.config.cache.max_entries;
        if max_entries == 0 {
            return;
        }
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.prune_to(max_entries).await {
                tracing::warn!(error = %e, "cache prune failed");
            }
        }
    }
}

/// Re-point every edge of `absorbed` at `survivor`. Unique-triple
/// collisions keep the max weight and the higher-precedence creator;
/// edges that would become self-loops are dropped.
pub(crate) async fn redirect_edges(
    db: &memoria_storage::Database,
    absorbed: uuid::Uuid,
    survivor: uuid::Uuid,
) -> Result<(), MemoriaError> {
    let edges = list_edges(db, absorbed, memoria_core::types::Direction::Both, None).await?;
    for edge in edges {
        delete_edge(db, edge.source_id, edge.target_id, Some(edge.relation)).await?;

        let (new_source, new_target) = if edge.source_id == absorbed {
            (survivor, edge.target_id)
        } else {
            (edge.source_id, survivor)
        };
        if new_source == new_target {
            continue; // edge between the merging pair collapses
        }

        let mut redirected = edge.clone();
        redirected.source_id = new_source;
        redirected.target_id = new_target;
        match insert_edge(db, &redirected).await {
            Ok(()) => {}
            Err(MemoriaError::DuplicateEdge { .. }) => {
                if let Some(existing) =
                    get_edge(db, new_source, new_target, edge.relation).await?
                {
                    let weight = existing.weight.max(edge.weight);
                    let creator = if edge.creator.rank() > existing.creator.rank() {
                        edge.creator
                    } else {
                        existing.creator
                    };
                    if weight != existing.weight || creator != existing.creator {
                        update_edge_weight(db, new_source, new_target, edge.relation, weight, creator)
                            .await?;
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Append the second content, dropping sentences already present in the
/// first (exact match after trimming).
pub(crate) fn merge_contents(primary: &str, secondary: &str) -> String {
    let known: HashSet<String> = split_sentences(primary)
        .map(|s| s.trim().to_string())
        .collect();
    let fresh: Vec<String> = split_sentences(secondary)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !known.contains(s))
        .collect();
    if fresh.is_empty() {
        return primary.to_string();
    }
    format!("{}\n\n{}", primary, fresh.join(" "))
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?'])
}

/// Union of two tag sets, case-insensitive, keeping the first-seen casing.
pub(crate) fn merge_tags(primary: &[String], secondary: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for tag in primary.iter().chain(secondary.iter()) {
        if seen.insert(tag_key(tag)) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Deep metadata merge: objects recurse, arrays union preserving first
/// occurrence order, colliding scalars keep the primary's value.
pub(crate) fn merge_metadata_deep(primary: &Metadata, secondary: &Metadata) -> Metadata {
    let mut merged = primary.clone();
    for (key, value) in secondary {
        match merged.get_mut(key) {
            None => {
                merged.insert(key.clone(), value.clone());
            }
            Some(existing) => {
                let resolved = merge_values(existing, value);
                *existing = resolved;
            }
        }
    }
    merged
}

fn merge_values(primary: &Value, secondary: &Value) -> Value {
    match (primary, secondary) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (key, value) in b {
                match merged.get_mut(key) {
                    None => {
                        merged.insert(key.clone(), value.clone());
                    }
                    Some(existing) => {
                        let resolved = merge_values(existing, value);
                        *existing = resolved;
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(a), Value::Array(b)) => {
            let mut merged = a.clone();
            for item in b {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Value::Array(merged)
        }
        (primary, _) => primary.clone(),
    }
}
