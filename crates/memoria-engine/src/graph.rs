// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge graph operations: linking, traversal wrappers, and relation
//! suggestions with a rejection ledger.
//!
//! Graph operations never mutate state when they return an error, and all
//! of them fail with `NotAvailable` when the relational layer is disabled.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use memoria_core::types::{
    tag_key, Edge, MemoryCategory, MemoryRecord, Metadata, Rejection, RelationCreator,
    RelationType,
};
use memoria_core::MemoriaError;
use memoria_storage::queries::{rejections, relations, traversal};
use memoria_storage::{BulkInsertReport, PathStep, Subgraph};
use memoria_vector::ChunkPayload;

use crate::manager::MemoryEngine;
use crate::options::{DiscoverOptions, RelatedOptions};

/// Fixed signal weights for suggestion confidence. Each signal is in
/// [0, 1], so confidence is too, and raising any signal with the others
/// fixed never lowers it.
const WEIGHT_SIMILARITY: f64 = 0.55;
const WEIGHT_TAG_JACCARD: f64 = 0.20;
const WEIGHT_METADATA: f64 = 0.15;
const WEIGHT_CO_ACCESS: f64 = 0.10;

/// A proposed relation between two memories.
#[derive(Debug, Clone)]
pub struct RelationSuggestion {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation: RelationType,
    /// Composite confidence in [0, 1].
    pub confidence: f64,
    /// Human-readable explanation of the proposal.
    pub reason: String,
    pub target_preview: String,
    pub target_tags: Vec<String>,
    pub target_category: MemoryCategory,
}

/// A neighbor enriched with its memory record.
#[derive(Debug, Clone)]
pub struct RelatedMemory {
    pub memory: MemoryRecord,
    pub depth: usize,
    pub relation: RelationType,
    pub weight: f64,
    pub path: Vec<Uuid>,
}

/// Outcome of a discovery scan.
#[derive(Debug)]
pub struct DiscoverReport {
    pub suggestions: Vec<RelationSuggestion>,
    pub auto_accepted: usize,
    pub scanned: usize,
}

impl MemoryEngine {
    /// Create an edge between two existing memories. Returns the stored
    /// edge; linking an already-linked triple returns the existing edge
    /// unchanged.
    pub async fn link(
        &self,
        source: Uuid,
        target: Uuid,
        relation: RelationType,
        weight: f64,
    ) -> Result<Edge, MemoriaError> {
        let db = self.graph_db()?.clone();
        if !(0.0..=1.0).contains(&weight) {
            return Err(MemoriaError::InvalidInput(format!(
                "edge weight {weight} outside [0, 1]"
            )));
        }
        if source == target {
            return Err(MemoriaError::SelfLoop(source));
        }
        self.require_memory(source).await?;
        self.require_memory(target).await?;

        let edge = Edge {
            source_id: source,
            target_id: target,
            relation,
            weight,
            creator: RelationCreator::User,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        };
        match relations::insert_edge(&db, &edge).await {
            Ok(()) => {
                info!(%source, %target, relation = relation.as_str(), "linked memories");
                Ok(edge)
            }
            Err(MemoriaError::DuplicateEdge { .. }) => relations::get_edge(&db, source, target, relation)
                .await?
                .ok_or_else(|| MemoriaError::Internal("duplicate edge vanished".into())),
            Err(e) => Err(e),
        }
    }

    /// Create many edges, counting outcomes. Edges whose endpoints are
    /// missing from the vector store count as errors.
    pub async fn link_bulk(
        &self,
        edges: Vec<(Uuid, Uuid, RelationType, f64)>,
        creator: RelationCreator,
    ) -> Result<BulkInsertReport, MemoriaError> {
        let db = self.graph_db()?.clone();
        let mut report = BulkInsertReport::default();
        for (source, target, relation, weight) in edges {
            if source == target
                || !(0.0..=1.0).contains(&weight)
                || self.vectors.find_memory(source).await?.is_none()
                || self.vectors.find_memory(target).await?.is_none()
            {
                report.errors += 1;
                continue;
            }
            let edge = Edge {
                source_id: source,
                target_id: target,
                relation,
                weight,
                creator,
                created_at: Utc::now(),
                metadata: Metadata::new(),
            };
            match relations::insert_edge(&db, &edge).await {
                Ok(()) => report.created += 1,
                Err(MemoriaError::DuplicateEdge { .. }) => report.duplicates += 1,
                Err(MemoriaError::Storage { .. }) => report.errors += 1,
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Remove edges between two memories; `relation = None` removes every
    /// parallel type. Returns the number removed.
    pub async fn unlink(
        &self,
        source: Uuid,
        target: Uuid,
        relation: Option<RelationType>,
    ) -> Result<usize, MemoriaError> {
        let db = self.graph_db()?.clone();
        relations::delete_edge(&db, source, target, relation).await
    }

    /// Edges incident to one memory.
    pub async fn edges_of(
        &self,
        memory_id: Uuid,
        direction: memoria_core::types::Direction,
        relation: Option<RelationType>,
    ) -> Result<Vec<Edge>, MemoriaError> {
        let db = self.graph_db()?.clone();
        relations::list_edges(&db, memory_id, direction, relation).await
    }

    /// Neighbors within `depth` hops, enriched with memory records and
    /// ranked by (depth, edge weight, importance).
    pub async fn related(
        &self,
        memory_id: Uuid,
        options: RelatedOptions,
    ) -> Result<Vec<RelatedMemory>, MemoriaError> {
        let db = self.graph_db()?.clone();
        self.require_memory(memory_id).await?;

        let neighbors = traversal::neighbors(
            &db,
            memory_id,
            options.depth.clamp(1, 5),
            options.types.as_deref(),
            options.direction,
        )
        .await?;

        let mut related = Vec::new();
        for neighbor in neighbors {
            let Some(record) = self.get(neighbor.memory_id).await? else {
                warn!(memory_id = %neighbor.memory_id, "neighbor missing from vector store");
                continue;
            };
            related.push(RelatedMemory {
                memory: record,
                depth: neighbor.depth,
                relation: neighbor.relation,
                weight: neighbor.weight,
                path: neighbor.path,
            });
        }

        related.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| {
                    b.weight
                        .partial_cmp(&a.weight)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    b.memory
                        .importance
                        .partial_cmp(&a.memory.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        if let Some(limit) = options.limit {
            related.truncate(limit);
        }
        Ok(related)
    }

    /// Shortest path between two memories, or empty if none within
    /// `max_depth` hops.
    pub async fn path(
        &self,
        from: Uuid,
        to: Uuid,
        max_depth: usize,
    ) -> Result<Vec<PathStep>, MemoriaError> {
        let db = self.graph_db()?.clone();
        traversal::shortest_path(&db, from, to, max_depth.clamp(1, 10)).await
    }

    /// The subgraph around one memory, for visualization.
    pub async fn subgraph(&self, center: Uuid, depth: usize) -> Result<Subgraph, MemoriaError> {
        let db = self.graph_db()?.clone();
        traversal::subgraph(&db, center, depth.clamp(1, 4)).await
    }

    /// Propose up to `limit` relations for one memory, ranked by
    /// confidence. Rejected triples and already-linked pairs never
    /// resurface.
    pub async fn suggest(
        &self,
        memory_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RelationSuggestion>, MemoriaError> {
        let db = self.graph_db()?.clone();
        let category = self
            .vectors
            .find_memory(memory_id)
            .await?
            .ok_or_else(|| MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            })?;
        let source = self
            .vectors
            .chunk_zero(category, memory_id)
            .await?
            .ok_or_else(|| MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            })?;

        // Over-fetch across all collections; chunk-0 points only.
        let per_category = (limit * 4).max(8);
        let mut candidates = Vec::new();
        for cat in MemoryCategory::ALL {
            let filter = memoria_vector::PayloadFilter::new().equals("chunk_index", 0);
            let hits = self
                .vectors
                .search(cat, &source.vector, per_category, Some(&filter))
                .await?;
            candidates.extend(hits);
        }

        let mut suggestions = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for hit in candidates {
            let target_id = hit.payload.memory_id;
            if target_id == memory_id || !seen.insert(target_id) {
                continue;
            }

            let relation = infer_relation_type(&source.payload, &hit.payload);
            if rejections::is_rejected(&db, memory_id, target_id, relation).await? {
                continue;
            }
            if relations::get_edge(&db, memory_id, target_id, relation)
                .await?
                .is_some()
            {
                continue;
            }

            let confidence = confidence_score(hit.score as f64, &source.payload, &hit.payload);
            let reason = explain_suggestion(relation, &source.payload, &hit.payload);
            suggestions.push(RelationSuggestion {
                source_id: memory_id,
                target_id,
                relation,
                confidence,
                reason,
                target_preview: hit.payload.content.chars().take(200).collect(),
                target_tags: hit.payload.tags.clone(),
                target_category: hit.payload.category,
            });
        }

        suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(limit);
        Ok(suggestions)
    }

    /// Batch discovery across memories without outgoing edges. Suggestions
    /// at or above the auto-accept threshold become edges immediately with
    /// `creator = auto`.
    pub async fn discover(
        &self,
        options: DiscoverOptions,
    ) -> Result<DiscoverReport, MemoriaError> {
        let db = self.graph_db()?.clone();
        let linked: std::collections::HashSet<Uuid> = if options.only_unlinked {
            relations::memories_with_outgoing(&db)
                .await?
                .into_iter()
                .collect()
        } else {
            std::collections::HashSet::new()
        };

        let categories = options
            .categories
            .clone()
            .unwrap_or_else(|| MemoryCategory::ALL.to_vec());

        let mut suggestions: Vec<RelationSuggestion> = Vec::new();
        let mut seen_pairs = std::collections::HashSet::new();
        let mut auto_accepted = 0usize;
        let mut scanned = 0usize;

        'scan: for &category in &categories {
            let zeros = self.collect_chunk_zeros(category).await?;
            for point in zeros {
                if suggestions.len() >= options.limit * 2 {
                    break 'scan; // buffer for post-sort truncation
                }
                let memory_id = point.payload.memory_id;
                if options.only_unlinked && linked.contains(&memory_id) {
                    continue;
                }
                scanned += 1;

                let proposals = self.suggest(memory_id, 5).await?;
                for proposal in proposals {
                    if proposal.confidence < options.min_confidence {
                        continue;
                    }
                    let pair = ordered_pair(proposal.source_id, proposal.target_id);
                    if !seen_pairs.insert(pair) {
                        continue;
                    }
                    if proposal.confidence >= options.auto_accept_threshold {
                        match self
                            .insert_auto_edge(proposal.source_id, proposal.target_id, proposal.relation)
                            .await
                        {
                            Ok(()) => {
                                auto_accepted += 1;
                                continue;
                            }
                            Err(MemoriaError::DuplicateEdge { .. }) => continue,
                            Err(e) => {
                                debug!(error = %e, "auto-accept failed");
                                continue;
                            }
                        }
                    }
                    suggestions.push(proposal);
                }
            }
        }

        suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(options.limit);
        info!(scanned, auto_accepted, "relation discovery finished");
        Ok(DiscoverReport {
            suggestions,
            auto_accepted,
            scanned,
        })
    }

    /// Record that a suggestion was refused; it will never be suggested
    /// again for this triple.
    pub async fn reject(
        &self,
        source: Uuid,
        target: Uuid,
        relation: RelationType,
    ) -> Result<(), MemoriaError> {
        let db = self.graph_db()?.clone();
        rejections::record_rejection(
            &db,
            &Rejection {
                source_id: source,
                target_id: target,
                relation,
                rejected_at: Utc::now(),
            },
        )
        .await
    }

    /// Materialize a previously-made suggestion as an edge.
    pub async fn accept_suggestion(
        &self,
        source: Uuid,
        target: Uuid,
        relation: RelationType,
    ) -> Result<Edge, MemoriaError> {
        let db = self.graph_db()?.clone();
        if source == target {
            return Err(MemoriaError::SelfLoop(source));
        }
        self.require_memory(source).await?;
        self.require_memory(target).await?;
        let edge = Edge {
            source_id: source,
            target_id: target,
            relation,
            weight: 1.0,
            creator: RelationCreator::Auto,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        };
        match relations::insert_edge(&db, &edge).await {
            Ok(()) => Ok(edge),
            Err(MemoriaError::DuplicateEdge { .. }) => relations::get_edge(&db, source, target, relation)
                .await?
                .ok_or_else(|| MemoriaError::Internal("duplicate edge vanished".into())),
            Err(e) => Err(e),
        }
    }

    async fn insert_auto_edge(
        &self,
        source: Uuid,
        target: Uuid,
        relation: RelationType,
    ) -> Result<(), MemoriaError> {
        let db = self.graph_db()?.clone();
        relations::insert_edge(
            &db,
            &Edge {
                source_id: source,
                target_id: target,
                relation,
                weight: 1.0,
                creator: RelationCreator::Auto,
                created_at: Utc::now(),
                metadata: Metadata::new(),
            },
        )
        .await
    }

    async fn require_memory(&self, memory_id: Uuid) -> Result<(), MemoriaError> {
        if self.vectors.find_memory(memory_id).await?.is_none() {
            return Err(MemoriaError::NotFound {
                kind: "memory",
                id: memory_id.to_string(),
            });
        }
        Ok(())
    }
}

fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Composite suggestion confidence: cosine similarity, shared-tag Jaccard,
/// project/client overlap, and co-access recency proximity, with fixed
/// weights.
pub(crate) fn confidence_score(
    similarity: f64,
    source: &ChunkPayload,
    target: &ChunkPayload,
) -> f64 {
    let jaccard = tag_jaccard(&source.tags, &target.tags);
    let metadata = metadata_overlap(source, target);
    let days_apart = (source.last_accessed_at - target.last_accessed_at)
        .num_seconds()
        .abs() as f64
        / 86_400.0;
    let recency = 1.0 / (1.0 + days_apart);

    (WEIGHT_SIMILARITY * similarity.clamp(0.0, 1.0)
        + WEIGHT_TAG_JACCARD * jaccard
        + WEIGHT_METADATA * metadata
        + WEIGHT_CO_ACCESS * recency)
        .clamp(0.0, 1.0)
}

fn tag_jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: std::collections::HashSet<String> = a.iter().map(|t| tag_key(t)).collect();
    let set_b: std::collections::HashSet<String> = b.iter().map(|t| tag_key(t)).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

/// Half a point each for matching `project` and `client` metadata.
fn metadata_overlap(source: &ChunkPayload, target: &ChunkPayload) -> f64 {
    let mut overlap = 0.0;
    for key in ["project", "client"] {
        if let (Some(a), Some(b)) = (source.metadata.get(key), target.metadata.get(key)) {
            if a == b {
                overlap += 0.5;
            }
        }
    }
    overlap
}

/// Keyword heuristic over both contents, most specific pattern first.
pub(crate) fn infer_relation_type(source: &ChunkPayload, target: &ChunkPayload) -> RelationType {
    const FIX: &[&str] = &[
        "fixes", "fixed", "fix", "resolves", "resolved", "solution", "workaround", "patch",
    ];
    const PROBLEM: &[&str] = &[
        "bug", "error", "problem", "issue", "crash", "fails", "broken", "exception",
    ];
    const CAUSE: &[&str] = &[
        "because", "causes", "caused", "leads to", "results in", "therefore",
    ];
    const SUPERSEDE: &[&str] = &[
        "deprecated", "obsolete", "replaces", "supersedes", "new version", "outdated",
    ];
    const OPPOSE: &[&str] = &["however", "contradicts", "instead", "disagree", "incorrect"];
    const SUPPORT: &[&str] = &["confirms", "supports", "validates", "consistent with"];
    const PART_OF: &[&str] = &["part of", "component of", "belongs to", "section of"];
    const DERIVES: &[&str] = &["derived from", "based on", "consolidated from"];

    let s = source.content.to_lowercase();
    let t = target.content.to_lowercase();
    let contains_any = |text: &str, words: &[&str]| words.iter().any(|w| text.contains(w));

    if (contains_any(&s, FIX) && contains_any(&t, PROBLEM))
        || (contains_any(&t, FIX) && contains_any(&s, PROBLEM))
    {
        return RelationType::Fixes;
    }
    if contains_any(&s, CAUSE) || contains_any(&t, CAUSE) {
        return RelationType::Causes;
    }
    if contains_any(&s, SUPERSEDE) || contains_any(&t, SUPERSEDE) {
        return RelationType::Supersedes;
    }
    if contains_any(&s, OPPOSE) || contains_any(&t, OPPOSE) {
        return RelationType::Opposes;
    }
    if contains_any(&s, SUPPORT) || contains_any(&t, SUPPORT) {
        return RelationType::Supports;
    }
    if contains_any(&s, PART_OF) {
        return RelationType::PartOf;
    }
    if contains_any(&s, DERIVES) {
        return RelationType::Derives;
    }

    // Temporal cue: created within an hour of each other with a shared tag.
    let within_hour =
        (source.created_at - target.created_at).num_seconds().abs() < 3_600;
    let shares_tag = source
        .tags
        .iter()
        .any(|a| target.tags.iter().any(|b| tag_key(a) == tag_key(b)));
    if within_hour && shares_tag && source.created_at > target.created_at {
        return RelationType::Follows;
    }

    RelationType::Related
}

fn explain_suggestion(
    relation: RelationType,
    source: &ChunkPayload,
    target: &ChunkPayload,
) -> String {
    let shared: Vec<String> = source
        .tags
        .iter()
        .filter(|a| target.tags.iter().any(|b| tag_key(a) == tag_key(b)))
        .take(3)
        .cloned()
        .collect();
    let same_project = matches!(
        (source.metadata.get("project"), target.metadata.get("project")),
        (Some(a), Some(b)) if a == b
    );
    let project_note = if same_project { " (same project)" } else { "" };

    let base = match relation {
        RelationType::Fixes => "appears to be a solution to a problem",
        RelationType::Causes => "contains a decision or action leading to consequences",
        RelationType::Follows => "subsequent event in the same context",
        RelationType::Opposes => "contains potentially contradicting information",
        RelationType::Supports => "contains supporting or confirming information",
        RelationType::Supersedes => "appears to be an updated version",
        RelationType::Derives => "derived or consolidated content",
        RelationType::PartOf => "appears to be a component of a larger concept",
        RelationType::Related => "similar content",
    };
    if shared.is_empty() {
        format!("{base}{project_note}")
    } else {
        format!("{base}, shared tags: {}{project_note}", shared.join(", "))
    }
}
