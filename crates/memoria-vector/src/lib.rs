// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store adapter for the Memoria memory engine.
//!
//! Chunk points live in three collections (one per memory category) with
//! denormalized payloads. Supports batched upsert, deletion by id or
//! payload predicate, filtered cosine-similarity search, and paginated
//! scrolling for maintenance passes.

pub mod filter;
pub mod payload;
pub mod store;

pub use filter::{PayloadFilter, Predicate};
pub use payload::{ChunkPayload, Point, SearchHit};
pub use store::{CollectionStats, VectorStore};
