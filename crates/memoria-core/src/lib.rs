// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Memoria memory engine.
//!
//! Provides the shared error type, the domain model (categories, memories,
//! edges, rejections), vector helpers, and the [`EmbeddingProvider`] trait
//! implemented by embedding backends.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MemoriaError;
pub use traits::EmbeddingProvider;
pub use types::{
    Direction, Edge, EmbeddingRole, MemoryCategory, MemoryRecord, Metadata, Rejection,
    RelationCreator, RelationType, ScoredMemory,
};
