// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::MemoriaError;
use crate::types::EmbeddingRole;

/// Converts text into fixed-dimension vectors.
///
/// Implementations must be safe for concurrent callers and must return
/// vectors of exactly [`EmbeddingProvider::dimension`] length. The engine
/// treats any provider failure as retryable unless it is a dimension
/// mismatch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text in the given role.
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, MemoriaError>;

    /// The configured vector dimension D.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model, used for cache keying.
    fn model_id(&self) -> &str;
}
