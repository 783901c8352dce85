// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Memoria engine.
//!
//! [`MemoryEngine`] is the façade over the embedding pipeline, the vector
//! store, and the relational graph: it stores free-form text as chunked,
//! embedded memories, recalls them by meaning, maintains them over time
//! (consolidation, decay, forgetting), manages typed relations between
//! them, and exports/imports the whole state.

pub mod backup;
pub mod consolidation;
pub mod context;
pub mod graph;
mod locks;
pub mod manager;
pub mod options;
pub mod reconcile;

pub use backup::{ExportCounts, ExportDocument, ExportedChunk, ExportedMemory, ImportReport};
pub use context::WorkingContext;
pub use graph::{DiscoverReport, RelatedMemory, RelationSuggestion};
pub use manager::{EngineStats, MemoryEngine};
pub use options::{
    ConsolidateOptions, ConsolidationReport, DecayOptions, DeleteTarget, DiscoverOptions,
    ForgetOptions, RecallOptions, RecallResponse, RelatedOptions, SearchOptions, SortBy,
    StoreOptions, UpdateOptions,
};
pub use reconcile::ReconcileReport;
