// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Memoria memory engine.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type used across all Memoria crates.
#[derive(Debug, Error)]
pub enum MemoriaError {
    /// Caller-supplied input was rejected (empty content, unknown category,
    /// weight out of range, malformed UUID).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An edge with the same (source, target, type) already exists.
    #[error("duplicate edge: {source_id} -> {target} ({relation})")]
    DuplicateEdge {
        source_id: Uuid,
        target: Uuid,
        relation: String,
    },

    /// Edges from a memory to itself are not allowed.
    #[error("self-referential edge rejected for {0}")]
    SelfLoop(Uuid),

    /// The rejection ledger already holds this (source, target, type) triple.
    #[error("suggestion already rejected: {source_id} -> {target} ({relation})")]
    DuplicateRejection {
        source_id: Uuid,
        target: Uuid,
        relation: String,
    },

    /// Vector or relational store unreachable after retries. Retryable.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding service transport failure after bounded retries. Retryable.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding service returned a vector of the wrong dimension.
    /// Latches the client until it is rebuilt from fresh configuration.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingMismatch { expected: usize, actual: usize },

    /// An external call exceeded its configured timeout. Retryable.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The operation was interrupted; partial writes are reconciled later.
    #[error("operation cancelled")]
    Cancelled,

    /// A feature is disabled by configuration (e.g. graph layer off).
    #[error("not available: {0}")]
    NotAvailable(&'static str),

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoriaError {
    /// Wrap an arbitrary source error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        MemoriaError::Storage {
            source: Box::new(source),
        }
    }

    /// Whether a caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoriaError::Storage { .. }
                | MemoriaError::EmbeddingUnavailable(_)
                | MemoriaError::Timeout { .. }
                | MemoriaError::Cancelled
        )
    }
}
