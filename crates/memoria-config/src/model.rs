// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Memoria memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Memoria configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoriaConfig {
    /// Engine-wide defaults.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Data directory and SQLite settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding service settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Persistent embedding cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Text chunking parameters.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval tuning.
    #[serde(default)]
    pub recall: RecallConfig,

    /// Maintenance defaults.
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// Knowledge graph layer settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

impl MemoriaConfig {
    /// Cross-field validation run after extraction. Returns the first
    /// offending setting as a human-readable message.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be positive".into());
        }
        if self.chunking.target_size == 0 {
            return Err("chunking.target_size must be positive".into());
        }
        if self.chunking.overlap >= self.chunking.target_size {
            return Err(format!(
                "chunking.overlap ({}) must be strictly less than chunking.target_size ({})",
                self.chunking.overlap, self.chunking.target_size
            ));
        }
        if !(0.0..=1.0).contains(&self.recall.min_score) {
            return Err("recall.min_score must be within [0, 1]".into());
        }
        if self.recall.overfetch_factor < 3 {
            return Err("recall.overfetch_factor must be at least 3".into());
        }
        if !(0.0..=1.0).contains(&self.consolidation.similarity_threshold) {
            return Err("consolidation.similarity_threshold must be within [0, 1]".into());
        }
        Ok(())
    }
}

/// Engine-wide defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Category assigned to stores that do not specify one.
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            log_level: default_log_level(),
        }
    }
}

fn default_category() -> String {
    "episodic".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Data directory and SQLite settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the vector, graph, and cache database files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("memoria").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".memoria".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Per-model prefixes prepended to text before embedding.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RolePrefixes {
    /// Prefix for search queries.
    #[serde(default)]
    pub query: String,

    /// Prefix for stored documents.
    #[serde(default)]
    pub document: String,
}

/// Embedding service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    #[serde(default = "default_embedding_host")]
    pub host: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector dimension D. Must match the vector store collections.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Per-model role prefixes. Models absent from the table get no prefix.
    #[serde(default = "default_role_prefixes")]
    pub role_prefixes: BTreeMap<String, RolePrefixes>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent in-flight embedding requests.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: default_embedding_host(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            role_prefixes: default_role_prefixes(),
            timeout_secs: default_embedding_timeout_secs(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_embedding_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimension() -> usize {
    768
}

fn default_role_prefixes() -> BTreeMap<String, RolePrefixes> {
    let mut table = BTreeMap::new();
    table.insert(
        "nomic-embed-text".to_string(),
        RolePrefixes {
            query: "search_query: ".to_string(),
            document: "search_document: ".to_string(),
        },
    );
    table.insert(
        "mxbai-embed-large".to_string(),
        RolePrefixes {
            query: "Represent this sentence for searching relevant passages: ".to_string(),
            document: String::new(),
        },
    );
    table
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_max_in_flight() -> usize {
    4
}

/// Persistent embedding cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Disables the cache entirely when false.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// LRU bound on cached entries. 0 means unbounded.
    #[serde(default)]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: 0,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

/// Text chunking parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Target window size in characters.
    #[serde(default = "default_target_size")]
    pub target_size: usize,

    /// Characters of overlap between adjacent windows. Strictly less
    /// than `target_size`.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_target_size() -> usize {
    500
}

fn default_overlap() -> usize {
    50
}

/// Retrieval tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Result count when the caller does not specify a limit.
    #[serde(default = "default_recall_limit")]
    pub default_limit: usize,

    /// Results scoring below this are dropped.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Per-category fetch size multiplier offsetting chunk deduplication.
    /// At least 3.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            default_limit: default_recall_limit(),
            min_score: default_min_score(),
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

fn default_recall_limit() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.5
}

fn default_overfetch_factor() -> usize {
    3
}

/// Maintenance defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConsolidationConfig {
    /// Disables consolidation when false.
    #[serde(default = "default_consolidation_enabled")]
    pub enabled: bool,

    /// Minimum cosine similarity for merging two memories.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Age ceiling (days) on merge candidates; also the forgetting horizon.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// Importance floor for merge candidates; also the forgetting threshold.
    #[serde(default = "default_min_importance")]
    pub min_importance: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            enabled: default_consolidation_enabled(),
            similarity_threshold: default_similarity_threshold(),
            max_age_days: default_max_age_days(),
            min_importance: default_min_importance(),
        }
    }
}

fn default_consolidation_enabled() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_max_age_days() -> i64 {
    30
}

fn default_min_importance() -> f64 {
    0.3
}

/// Knowledge graph layer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Disables the relational layer when false; graph operations then
    /// fail with a not-available error.
    #[serde(default = "default_graph_enabled")]
    pub enabled: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: default_graph_enabled(),
        }
    }
}

fn default_graph_enabled() -> bool {
    true
}
