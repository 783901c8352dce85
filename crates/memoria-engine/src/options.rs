// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-operation option structs and result shapes.
//!
//! Every engine operation takes an explicit options struct with documented
//! defaults instead of an open-ended argument bag.

use std::time::Duration;

use uuid::Uuid;

use memoria_core::types::{Direction, MemoryCategory, Metadata, RelationType, ScoredMemory};
use memoria_vector::PayloadFilter;

/// Options for [`MemoryEngine::store`](crate::MemoryEngine::store).
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Category; defaults to the configured default category.
    pub category: Option<MemoryCategory>,
    /// Tags; empty by default.
    pub tags: Vec<String>,
    /// Importance in [0, 1]; defaults to 0.5.
    pub importance: Option<f64>,
    /// Caller metadata. Working-context keys are merged in underneath
    /// (explicit keys win).
    pub metadata: Metadata,
}

/// Options for [`MemoryEngine::recall`](crate::MemoryEngine::recall).
#[derive(Debug, Clone, Default)]
pub struct RecallOptions {
    /// Categories to search; all three by default.
    pub categories: Option<Vec<MemoryCategory>>,
    /// Result cap; defaults to `recall.default_limit`.
    pub limit: Option<usize>,
    /// Score floor; defaults to `recall.min_score`.
    pub min_score: Option<f32>,
    /// Case-insensitive substring that must appear in a matching chunk.
    pub text_match: Option<String>,
    /// Payload predicate conjunction.
    pub filter: Option<PayloadFilter>,
}

/// Recall output. `partial` is set when some requested categories were
/// unavailable and their results are missing.
#[derive(Debug, Clone)]
pub struct RecallResponse {
    pub results: Vec<ScoredMemory>,
    pub partial: bool,
}

/// Ranking for [`MemoryEngine::search`](crate::MemoryEngine::search).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
    Importance,
    AccessCount,
}

/// Options for [`MemoryEngine::search`](crate::MemoryEngine::search).
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Semantic query; when absent, results are ranked by `sort_by` alone
    /// over a filtered scroll.
    pub query: Option<String>,
    pub categories: Option<Vec<MemoryCategory>>,
    pub filter: Option<PayloadFilter>,
    pub text_match: Option<String>,
    pub sort_by: SortBy,
    pub limit: Option<usize>,
}

/// Options for [`MemoryEngine::update`](crate::MemoryEngine::update).
/// Unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// New content; triggers a full re-chunk and re-embed when it differs.
    pub content: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// Replacement importance in [0, 1].
    pub importance: Option<f64>,
    /// Key-wise metadata merge; an explicit JSON `null` removes the key.
    pub metadata: Option<Metadata>,
}

/// What [`MemoryEngine::delete`](crate::MemoryEngine::delete) removes.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    Id(Uuid),
    Ids(Vec<Uuid>),
    Filter {
        categories: Option<Vec<MemoryCategory>>,
        filter: PayloadFilter,
    },
}

/// Options for consolidation. Unset fields fall back to the
/// `[consolidation]` config section.
#[derive(Debug, Clone, Default)]
pub struct ConsolidateOptions {
    pub similarity_threshold: Option<f64>,
    /// Only memories at least this important participate in merging.
    pub min_importance: Option<f64>,
    /// Only memories at most this old (days) participate in merging.
    pub max_age_days: Option<i64>,
    pub dry_run: bool,
}

/// Options for forgetting.
#[derive(Debug, Clone, Default)]
pub struct ForgetOptions {
    /// Age floor in days since last access.
    pub max_age_days: Option<i64>,
    /// Importance ceiling.
    pub min_importance: Option<f64>,
    pub dry_run: bool,
}

/// Options for importance decay.
#[derive(Debug, Clone)]
pub struct DecayOptions {
    /// Half-life in days. Memories untouched for longer than this start
    /// decaying.
    pub half_life_days: i64,
    pub dry_run: bool,
}

impl Default for DecayOptions {
    fn default() -> Self {
        Self {
            half_life_days: 7,
            dry_run: false,
        }
    }
}

/// Outcome of a maintenance operation. With `is_preview` set the counts
/// describe what would have changed.
#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub operation: &'static str,
    pub merged_count: usize,
    pub forgotten_count: usize,
    pub updated_count: usize,
    pub total_processed: usize,
    pub duration: Duration,
    pub is_preview: bool,
}

/// Options for [`MemoryEngine::related`](crate::MemoryEngine::related).
#[derive(Debug, Clone)]
pub struct RelatedOptions {
    pub depth: usize,
    pub types: Option<Vec<RelationType>>,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl Default for RelatedOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            types: None,
            direction: Direction::Both,
            limit: None,
        }
    }
}

/// Options for [`MemoryEngine::discover`](crate::MemoryEngine::discover).
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Cap on returned (non-auto-accepted) suggestions.
    pub limit: usize,
    /// Suggestions below this confidence are dropped.
    pub min_confidence: f64,
    /// Suggestions at or above this confidence become edges immediately.
    pub auto_accept_threshold: f64,
    /// Scan only memories without any outgoing edge.
    pub only_unlinked: bool,
    pub categories: Option<Vec<MemoryCategory>>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            min_confidence: 0.70,
            auto_accept_threshold: 0.90,
            only_unlinked: true,
            categories: None,
        }
    }
}
