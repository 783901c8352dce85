// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result shapes for graph queries.

use uuid::Uuid;

use memoria_core::types::RelationType;

/// A memory reached by breadth-first traversal.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub memory_id: Uuid,
    /// Hop count from the start memory (1-based).
    pub depth: usize,
    /// Node sequence from the start memory to this one, inclusive.
    pub path: Vec<Uuid>,
    /// The relation on the final hop.
    pub relation: RelationType,
    /// Weight of the final hop's edge.
    pub weight: f64,
}

/// Traversal direction of one hop in a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// The edge points along the walk (source → target).
    Forward,
    /// The edge points against the walk.
    Backward,
}

impl StepDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepDirection::Forward => "forward",
            StepDirection::Backward => "backward",
        }
    }
}

/// One node on a shortest path. The first step carries no relation.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub memory_id: Uuid,
    pub relation: Option<RelationType>,
    pub direction: Option<StepDirection>,
}

/// An edge within a subgraph, annotated with the traversal depth at which
/// it first appears.
#[derive(Debug, Clone)]
pub struct SubgraphEdge {
    pub edge: memoria_core::types::Edge,
    pub depth: usize,
}

/// A subgraph extracted around a center memory.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub center: Uuid,
    pub depth: usize,
    /// Every memory id in the subgraph, center included.
    pub nodes: Vec<Uuid>,
    pub edges: Vec<SubgraphEdge>,
}

/// Outcome counts for a bulk edge insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertReport {
    pub created: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// Per-type incoming/outgoing edge counts for one memory.
#[derive(Debug, Clone, Default)]
pub struct RelationCounts {
    pub by_type: Vec<(RelationType, usize, usize)>,
}

impl RelationCounts {
    /// Total edges incident to the memory.
    pub fn total(&self) -> usize {
        self.by_type.iter().map(|(_, out, inc)| out + inc).sum()
    }
}
