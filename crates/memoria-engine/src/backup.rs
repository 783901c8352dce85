// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portable export and import of memories, edges, and the rejection
//! ledger.
//!
//! The export document is a single UTF-8 JSON file. When vectors are
//! included, import rebuilds each memory's chunk windows with the
//! deterministic chunker and pairs them with the exported vectors, so no
//! re-embedding is needed; if the chunk counts disagree (chunker settings
//! changed between export and import) it falls back to re-embedding.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use memoria_core::types::{Edge, MemoryCategory, Metadata, Rejection};
use memoria_core::MemoriaError;
use memoria_storage::queries::{rejections, relations};
use memoria_vector::Point;

use crate::manager::MemoryEngine;

/// Export format version.
const EXPORT_VERSION: &str = "1";

/// One chunk vector in an export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedChunk {
    pub chunk_index: u32,
    pub vector: Vec<f32>,
}

/// One logical memory in an export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedMemory {
    pub id: Uuid,
    pub category: MemoryCategory,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<ExportedChunk>>,
}

/// Record counts in the export header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCounts {
    pub memories: usize,
    pub edges: usize,
    pub rejections: usize,
}

/// The complete export document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub counts: ExportCounts,
    pub include_vectors: bool,
    pub memories: Vec<ExportedMemory>,
    pub edges: Vec<Edge>,
    pub rejections: Vec<Rejection>,
}

/// Outcome counts for an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub memories_created: usize,
    pub memories_skipped: usize,
    pub memory_errors: usize,
    pub edges_created: usize,
    pub edges_skipped: usize,
    pub edge_errors: usize,
    pub rejections_restored: usize,
}

impl MemoryEngine {
    /// Build the export document from the current state.
    pub async fn export(&self, include_vectors: bool) -> Result<ExportDocument, MemoriaError> {
        let mut memories = Vec::new();
        for category in MemoryCategory::ALL {
            for zero in self.collect_chunk_zeros(category).await? {
                let p = &zero.payload;
                let chunks = if include_vectors {
                    let all = self.vectors.chunks_of(category, p.memory_id).await?;
                    Some(
                        all.into_iter()
                            .map(|point| ExportedChunk {
                                chunk_index: point.payload.chunk_index,
                                vector: point.vector,
                            })
                            .collect(),
                    )
                } else {
                    None
                };
                memories.push(ExportedMemory {
                    id: p.memory_id,
                    category: p.category,
                    content: p.content.clone(),
                    tags: p.tags.clone(),
                    importance: p.importance,
                    metadata: p.metadata.clone(),
                    created_at: p.created_at,
                    updated_at: p.updated_at,
                    last_accessed_at: p.last_accessed_at,
                    access_count: p.access_count,
                    chunks,
                });
            }
        }

        let (edges, rejection_list) = match &self.graph {
            Some(db) => (
                relations::all_edges(db).await?,
                rejections::all_rejections(db).await?,
            ),
            None => (vec![], vec![]),
        };

        info!(
            memories = memories.len(),
            edges = edges.len(),
            include_vectors,
            "built export document"
        );
        Ok(ExportDocument {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now(),
            counts: ExportCounts {
                memories: memories.len(),
                edges: edges.len(),
                rejections: rejection_list.len(),
            },
            include_vectors,
            memories,
            edges,
            rejections: rejection_list,
        })
    }

    /// Export to a JSON file at `path`.
    pub async fn export_to_path(
        &self,
        path: &Path,
        include_vectors: bool,
    ) -> Result<ExportDocument, MemoriaError> {
        let document = self.export(include_vectors).await?;
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| MemoriaError::Internal(format!("failed to serialize export: {e}")))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| MemoriaError::Storage { source: Box::new(e) })?;
        Ok(document)
    }

    /// Import a document. With `skip_existing`, memories whose id already
    /// exists are counted as skipped; otherwise they are overwritten.
    pub async fn import(
        &self,
        document: &ExportDocument,
        skip_existing: bool,
    ) -> Result<ImportReport, MemoriaError> {
        if document.version != EXPORT_VERSION {
            return Err(MemoriaError::InvalidInput(format!(
                "unsupported export version {:?}",
                document.version
            )));
        }

        let mut report = ImportReport::default();

        for memory in &document.memories {
            let exists = self.vectors.find_memory(memory.id).await?.is_some();
            if exists && skip_existing {
                report.memories_skipped += 1;
                continue;
            }
            match self.import_memory(memory, exists).await {
                Ok(()) => report.memories_created += 1,
                Err(e) => {
                    warn!(memory_id = %memory.id, error = %e, "failed to import memory");
                    report.memory_errors += 1;
                }
            }
        }

        if let Some(db) = &self.graph {
            for edge in &document.edges {
                match relations::insert_edge(db, edge).await {
                    Ok(()) => report.edges_created += 1,
                    Err(MemoriaError::DuplicateEdge { .. }) => report.edges_skipped += 1,
                    Err(e) => {
                        warn!(error = %e, "failed to import edge");
                        report.edge_errors += 1;
                    }
                }
            }
            for rejection in &document.rejections {
                match rejections::record_rejection(db, rejection).await {
                    Ok(()) => report.rejections_restored += 1,
                    Err(MemoriaError::DuplicateRejection { .. }) => {}
                    Err(e) => {
                        warn!(error = %e, "failed to import rejection");
                    }
                }
            }
        }

        info!(
            created = report.memories_created,
            skipped = report.memories_skipped,
            edges = report.edges_created,
            "import finished"
        );
        Ok(report)
    }

    /// Import a document from a JSON file at `path`.
    pub async fn import_from_path(
        &self,
        path: &Path,
        skip_existing: bool,
    ) -> Result<ImportReport, MemoriaError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MemoriaError::Storage { source: Box::new(e) })?;
        let document: ExportDocument = serde_json::from_slice(&bytes)
            .map_err(|e| MemoriaError::InvalidInput(format!("malformed export file: {e}")))?;
        self.import(&document, skip_existing).await
    }

    async fn import_memory(
        &self,
        memory: &ExportedMemory,
        overwrite: bool,
    ) -> Result<(), MemoriaError> {
        let _guard = self.locks.lock(memory.id).await;

        let points = match &memory.chunks {
            Some(chunks) if !chunks.is_empty() => {
                match self.rebuild_points_from_vectors(memory, chunks) {
                    Some(points) => points,
                    None => {
                        warn!(
                            memory_id = %memory.id,
                            "exported chunk layout does not match chunker, re-embedding"
                        );
                        self.reembed_imported(memory).await?
                    }
                }
            }
            _ => self.reembed_imported(memory).await?,
        };

        if overwrite {
            self.vectors.delete_memory(memory.category, memory.id).await?;
        }
        self.vectors.upsert(memory.category, points).await
    }

    /// Pair the exported vectors with freshly derived chunk windows.
    /// Returns `None` when the window count or any vector dimension does
    /// not line up.
    fn rebuild_points_from_vectors(
        &self,
        memory: &ExportedMemory,
        chunks: &[ExportedChunk],
    ) -> Option<Vec<Point>> {
        let windows: Vec<_> = self.chunker.split(&memory.content).collect();
        if windows.len() != chunks.len() {
            return None;
        }
        let mut sorted: Vec<&ExportedChunk> = chunks.iter().collect();
        sorted.sort_by_key(|c| c.chunk_index);
        if sorted
            .iter()
            .enumerate()
            .any(|(i, c)| c.chunk_index as usize != i)
        {
            return None;
        }
        if sorted
            .iter()
            .any(|c| c.vector.len() != self.vectors.dimension())
        {
            return None;
        }

        let chunk_count = windows.len() as u32;
        let points = windows
            .iter()
            .zip(sorted.iter())
            .map(|(window, exported)| {
                let content = if window.index == 0 {
                    memory.content.clone()
                } else {
                    window.text.clone()
                };
                Point {
                    id: Uuid::new_v4(),
                    vector: exported.vector.clone(),
                    payload: memoria_vector::ChunkPayload {
                        memory_id: memory.id,
                        chunk_index: window.index as u32,
                        chunk_count,
                        content,
                        tags: memory.tags.clone(),
                        importance: memory.importance,
                        category: memory.category,
                        created_at: memory.created_at,
                        updated_at: memory.updated_at,
                        last_accessed_at: memory.last_accessed_at,
                        access_count: memory.access_count,
                        metadata: memory.metadata.clone(),
                    },
                }
            })
            .collect();
        Some(points)
    }

    /// Chunk and embed an imported memory that carries no vectors,
    /// preserving its identity and timestamps.
    async fn reembed_imported(
        &self,
        memory: &ExportedMemory,
    ) -> Result<Vec<Point>, MemoriaError> {
        let mut points = self
            .embed_chunks(
                memory.id,
                &memory.content,
                memory.category,
                memory.tags.clone(),
                memory.importance,
                memory.metadata.clone(),
                memory.created_at,
            )
            .await?;
        for point in &mut points {
            point.payload.updated_at = memory.updated_at;
            point.payload.last_accessed_at = memory.last_accessed_at;
            point.payload.access_count = memory.access_count;
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_serializes_to_the_fixed_shape() {
        let document = ExportDocument {
            version: "1".into(),
            exported_at: Utc::now(),
            counts: ExportCounts {
                memories: 1,
                edges: 0,
                rejections: 0,
            },
            include_vectors: true,
            memories: vec![ExportedMemory {
                id: Uuid::new_v4(),
                category: MemoryCategory::Semantic,
                content: "content".into(),
                tags: vec!["stack".into()],
                importance: 0.8,
                metadata: Metadata::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                last_accessed_at: Utc::now(),
                access_count: 1,
                chunks: Some(vec![ExportedChunk {
                    chunk_index: 0,
                    vector: vec![0.1, 0.2],
                }]),
            }],
            edges: vec![],
            rejections: vec![],
        };

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["version"], "1");
        assert_eq!(value["include_vectors"], json!(true));
        assert_eq!(value["memories"][0]["category"], "semantic");
        assert_eq!(value["memories"][0]["chunks"][0]["chunk_index"], 0);
        assert!(value["memories"][0]["created_at"].is_string());
    }

    #[test]
    fn chunks_field_is_omitted_without_vectors() {
        let memory = ExportedMemory {
            id: Uuid::new_v4(),
            category: MemoryCategory::Episodic,
            content: "content".into(),
            tags: vec![],
            importance: 0.5,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_accessed_at: Utc::now(),
            access_count: 0,
            chunks: None,
        };
        let value = serde_json::to_value(&memory).unwrap();
        assert!(value.get("chunks").is_none());
    }

    #[test]
    fn document_roundtrips_through_json() {
        let document = ExportDocument {
            version: "1".into(),
            exported_at: Utc::now(),
            counts: ExportCounts::default(),
            include_vectors: false,
            memories: vec![],
            edges: vec![],
            rejections: vec![],
        };
        let text = serde_json::to_string(&document).unwrap();
        let parsed: ExportDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.version, "1");
        assert!(!parsed.include_vectors);
    }
}
