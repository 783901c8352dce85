// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational store for the Memoria knowledge graph.
//!
//! Holds the typed edges between memories and the rejection ledger in
//! SQLite, with embedded refinery migrations. Traversal queries (neighbors,
//! shortest path, subgraph) are breadth-first and cycle-safe.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::{
    BulkInsertReport, Neighbor, PathStep, RelationCounts, StepDirection, Subgraph, SubgraphEdge,
};
