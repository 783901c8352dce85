// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external embedding service.
//!
//! Speaks the Ollama-style wire protocol: POST `{host}/api/embeddings` with
//! `{model, prompt}`, response `{embedding: [f32; D]}`. Transport failures
//! are retried with exponential backoff; a dimension mismatch latches the
//! client until it is rebuilt from fresh configuration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use memoria_config::model::{EmbeddingConfig, RolePrefixes};
use memoria_core::{EmbeddingProvider, EmbeddingRole, MemoriaError};

/// Transport attempts per embed call.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts.
const BACKOFF_BASE: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Description of the configured model, for diagnostics.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub model: String,
    pub host: String,
    pub dimension: usize,
    pub query_prefix: String,
    pub document_prefix: String,
}

/// Embedding client for an HTTP embedding service.
pub struct HttpEmbedder {
    http: reqwest::Client,
    host: String,
    model: String,
    dimension: usize,
    prefixes: RolePrefixes,
    timeout: Duration,
    /// Bounds concurrent in-flight requests; excess callers suspend here.
    limiter: Semaphore,
    /// Set on dimension mismatch; all further calls fail fast.
    poisoned: AtomicBool,
    last_mismatch: AtomicUsize,
}

impl HttpEmbedder {
    /// Build a client from configuration. The role prefix table is resolved
    /// for the configured model; models absent from the table get no prefix.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, MemoriaError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoriaError::Internal(format!("failed to create HTTP client: {e}")))?;

        let prefixes = config
            .role_prefixes
            .get(&config.model)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            prefixes,
            timeout,
            limiter: Semaphore::new(config.max_in_flight.max(1)),
            poisoned: AtomicBool::new(false),
            last_mismatch: AtomicUsize::new(0),
        })
    }

    /// Prepend the model's role prefix, if it has one.
    pub fn apply_prefix(&self, text: &str, role: EmbeddingRole) -> String {
        let prefix = match role {
            EmbeddingRole::Query => &self.prefixes.query,
            EmbeddingRole::Document => &self.prefixes.document,
        };
        format!("{prefix}{text}")
    }

    /// Probe the service. Used by the doctor command; never fails hard.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "embedding service probe failed");
                false
            }
        }
    }

    /// Describe the configured model.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.model.clone(),
            host: self.host.clone(),
            dimension: self.dimension,
            query_prefix: self.prefixes.query.clone(),
            document_prefix: self.prefixes.document.clone(),
        }
    }

    async fn request_embedding(&self, prompt: &str) -> Result<Vec<f32>, MemoriaError> {
        let url = format!("{}/api/embeddings", self.host);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "model": self.model, "prompt": prompt }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MemoriaError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    MemoriaError::EmbeddingUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(MemoriaError::EmbeddingUnavailable(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoriaError::EmbeddingUnavailable(format!("malformed response: {e}")))?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>, MemoriaError> {
        if text.trim().is_empty() {
            return Err(MemoriaError::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }
        if self.poisoned.load(Ordering::Acquire) {
            return Err(MemoriaError::EmbeddingMismatch {
                expected: self.dimension,
                actual: self.last_mismatch.load(Ordering::Acquire),
            });
        }

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| MemoriaError::Cancelled)?;

        let prompt = self.apply_prefix(text, role);
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
            }
            match self.request_embedding(&prompt).await {
                Ok(vector) => {
                    if vector.len() != self.dimension {
                        self.last_mismatch.store(vector.len(), Ordering::Release);
                        self.poisoned.store(true, Ordering::Release);
                        warn!(
                            expected = self.dimension,
                            actual = vector.len(),
                            model = %self.model,
                            "embedding dimension mismatch, disabling model"
                        );
                        return Err(MemoriaError::EmbeddingMismatch {
                            expected: self.dimension,
                            actual: vector.len(),
                        });
                    }
                    return Ok(vector);
                }
                Err(e) if e.is_retryable() => {
                    debug!(attempt, error = %e, "embedding request failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| MemoriaError::EmbeddingUnavailable("retries exhausted".into())))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_config::model::EmbeddingConfig;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[test]
    fn prefixes_resolve_for_known_model() {
        let embedder = HttpEmbedder::new(&config()).unwrap();
        assert_eq!(
            embedder.apply_prefix("rust", EmbeddingRole::Query),
            "search_query: rust"
        );
        assert_eq!(
            embedder.apply_prefix("rust", EmbeddingRole::Document),
            "search_document: rust"
        );
    }

    #[test]
    fn unknown_model_gets_no_prefix() {
        let mut cfg = config();
        cfg.model = "some-unlisted-model".into();
        let embedder = HttpEmbedder::new(&cfg).unwrap();
        assert_eq!(embedder.apply_prefix("rust", EmbeddingRole::Query), "rust");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_network() {
        // Host points nowhere; an empty input must fail before any request.
        let mut cfg = config();
        cfg.host = "http://127.0.0.1:1".into();
        let embedder = HttpEmbedder::new(&cfg).unwrap();
        let err = embedder.embed("   ", EmbeddingRole::Document).await.unwrap_err();
        assert!(matches!(err, MemoriaError::InvalidInput(_)));
    }

    #[test]
    fn model_info_reports_configuration() {
        let embedder = HttpEmbedder::new(&config()).unwrap();
        let info = embedder.model_info();
        assert_eq!(info.model, "nomic-embed-text");
        assert_eq!(info.dimension, 768);
        assert_eq!(info.query_prefix, "search_query: ");
    }

    #[test]
    fn trailing_slash_in_host_is_trimmed() {
        let mut cfg = config();
        cfg.host = "http://localhost:11434/".into();
        let embedder = HttpEmbedder::new(&cfg).unwrap();
        assert_eq!(embedder.model_info().host, "http://localhost:11434");
    }
}
