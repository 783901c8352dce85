// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding pipeline for the Memoria memory engine.
//!
//! - [`HttpEmbedder`]: client for the external embedding service, with role
//!   prefixes, bounded retries, and an in-flight request cap.
//! - [`EmbeddingCache`]: persistent key→vector store keyed by normalized
//!   text, model, and dimension.
//! - [`CachingEmbedder`]: provider wrapper that consults the cache first.
//! - [`Chunker`]: boundary-aware overlapping text windows.

pub mod cache;
pub mod chunker;
pub mod client;
pub mod embedder;

pub use cache::{CacheStats, EmbeddingCache};
pub use chunker::{Chunk, Chunker, Chunks};
pub use client::{HttpEmbedder, ModelInfo};
pub use embedder::CachingEmbedder;
