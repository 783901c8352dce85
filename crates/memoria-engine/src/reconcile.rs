// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-store drift repair.
//!
//! The vector and relational stores share no transaction, so interrupted
//! operations can leave orphan chunks (a memory with no chunk 0) or edges
//! whose endpoints are gone. Findings are logged and cleaned up, never
//! propagated as errors to callers.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use uuid::Uuid;

use memoria_core::types::MemoryCategory;
use memoria_core::MemoriaError;
use memoria_storage::queries::relations;

use crate::manager::MemoryEngine;

/// What a reconciliation pass found and repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Chunks removed because their memory had no chunk 0.
    pub orphan_chunks_removed: usize,
    /// Edges removed because an endpoint no longer exists.
    pub dangling_edges_removed: usize,
    /// Memory ids drained from the failed-compensation queue.
    pub queue_drained: usize,
}

impl MemoryEngine {
    /// Scan both stores for drift and repair it. Run at startup and by the
    /// `doctor` command; safe to run at any time.
    pub async fn reconcile(&self) -> Result<ReconcileReport, MemoriaError> {
        let _lease = self.maintenance.lock().await;
        let mut report = ReconcileReport::default();

        // Drain ids whose store-failure compensation did not complete.
        let queued: Vec<Uuid> = {
            let mut queue = self
                .repair_queue
                .lock()
                .map_err(|_| MemoriaError::Internal("repair queue poisoned".into()))?;
            std::mem::take(&mut *queue)
        };
        for memory_id in queued {
            warn!(%memory_id, "repairing memory from failed compensation");
            for category in MemoryCategory::ALL {
                self.vectors.delete_memory(category, memory_id).await?;
            }
            report.queue_drained += 1;
        }

        // Orphan chunks: memories whose chunk set lost chunk 0.
        for category in MemoryCategory::ALL {
            let mut has_zero: HashMap<Uuid, bool> = HashMap::new();
            let mut cursor = None;
            loop {
                let (page, next) = self.vectors.scroll(category, None, cursor, 500).await?;
                for point in &page {
                    let entry = has_zero.entry(point.payload.memory_id).or_insert(false);
                    *entry |= point.payload.chunk_index == 0;
                }
                match next {
                    Some(c) => cursor = Some(c),
                    None => break,
                }
            }
            for (memory_id, complete) in has_zero {
                if complete {
                    continue;
                }
                warn!(%memory_id, category = category.as_str(), "removing orphan chunks");
                report.orphan_chunks_removed +=
                    self.vectors.delete_memory(category, memory_id).await?;
            }
        }

        // Dangling edges: endpoints absent from the vector store.
        if let Some(db) = &self.graph {
            let edges = relations::all_edges(db).await?;
            let mut known: HashSet<Uuid> = HashSet::new();
            let mut missing: HashSet<Uuid> = HashSet::new();
            for edge in &edges {
                for id in [edge.source_id, edge.target_id] {
                    if known.contains(&id) || missing.contains(&id) {
                        continue;
                    }
                    if self.vectors.find_memory(id).await?.is_some() {
                        known.insert(id);
                    } else {
                        missing.insert(id);
                    }
                }
            }
            for edge in &edges {
                if missing.contains(&edge.source_id) || missing.contains(&edge.target_id) {
                    warn!(
                        source = %edge.source_id,
                        target = %edge.target_id,
                        relation = edge.relation.as_str(),
                        "removing edge with missing endpoint"
                    );
                    report.dangling_edges_removed += relations::delete_edge(
                        db,
                        edge.source_id,
                        edge.target_id,
                        Some(edge.relation),
                    )
                    .await?;
                }
            }
        }

        info!(
            orphan_chunks = report.orphan_chunks_removed,
            dangling_edges = report.dangling_edges_removed,
            queue_drained = report.queue_drained,
            "reconciliation finished"
        );
        Ok(report)
    }
}
