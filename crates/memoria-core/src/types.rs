// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Memoria workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoriaError;

/// Free-form metadata attached to memories and edges.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The three memory categories. Each category is backed by its own
/// vector collection of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    /// Time-bound events and experiences.
    Episodic,
    /// Facts and general knowledge.
    Semantic,
    /// Skills, procedures, and workflows.
    Procedural,
}

impl MemoryCategory {
    /// All categories, in collection order.
    pub const ALL: [MemoryCategory; 3] = [
        MemoryCategory::Episodic,
        MemoryCategory::Semantic,
        MemoryCategory::Procedural,
    ];

    /// Collection name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Episodic => "episodic",
            MemoryCategory::Semantic => "semantic",
            MemoryCategory::Procedural => "procedural",
        }
    }

    /// Parse a category name; unknown names are an input error.
    pub fn parse(s: &str) -> Result<Self, MemoriaError> {
        match s {
            "episodic" => Ok(MemoryCategory::Episodic),
            "semantic" => Ok(MemoryCategory::Semantic),
            "procedural" => Ok(MemoryCategory::Procedural),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown memory category: {other}"
            ))),
        }
    }
}

/// Whether a text is embedded as a search query or as stored content.
/// Some models want different prefixes for the two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
    Query,
    Document,
}

/// Typed relation between two memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causes,
    Fixes,
    Supports,
    Opposes,
    Follows,
    Supersedes,
    Derives,
    PartOf,
    Related,
}

impl RelationType {
    /// Wire/storage name of this relation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Causes => "causes",
            RelationType::Fixes => "fixes",
            RelationType::Supports => "supports",
            RelationType::Opposes => "opposes",
            RelationType::Follows => "follows",
            RelationType::Supersedes => "supersedes",
            RelationType::Derives => "derives",
            RelationType::PartOf => "part_of",
            RelationType::Related => "related",
        }
    }

    /// Parse a relation type name; unknown names are an input error.
    pub fn parse(s: &str) -> Result<Self, MemoriaError> {
        match s {
            "causes" => Ok(RelationType::Causes),
            "fixes" => Ok(RelationType::Fixes),
            "supports" => Ok(RelationType::Supports),
            "opposes" => Ok(RelationType::Opposes),
            "follows" => Ok(RelationType::Follows),
            "supersedes" => Ok(RelationType::Supersedes),
            "derives" => Ok(RelationType::Derives),
            "part_of" => Ok(RelationType::PartOf),
            "related" => Ok(RelationType::Related),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown relation type: {other}"
            ))),
        }
    }
}

/// Who created an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationCreator {
    User,
    Auto,
    System,
}

impl RelationCreator {
    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationCreator::User => "user",
            RelationCreator::Auto => "auto",
            RelationCreator::System => "system",
        }
    }

    /// Parse a creator name; unknown names are an input error.
    pub fn parse(s: &str) -> Result<Self, MemoriaError> {
        match s {
            "user" => Ok(RelationCreator::User),
            "auto" => Ok(RelationCreator::Auto),
            "system" => Ok(RelationCreator::System),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown relation creator: {other}"
            ))),
        }
    }

    /// Precedence when merged edges collide: user > auto > system.
    pub fn rank(&self) -> u8 {
        match self {
            RelationCreator::User => 2,
            RelationCreator::Auto => 1,
            RelationCreator::System => 0,
        }
    }
}

/// Direction of edge queries relative to a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// A logical memory record, independent of how many chunks back it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stable identifier shared by all chunks of this memory.
    pub id: Uuid,
    pub category: MemoryCategory,
    /// The full original content.
    pub content: String,
    /// Case-preserving tags; compared case-insensitively.
    pub tags: Vec<String>,
    /// Resistance to decay and forgetting, in [0, 1].
    pub importance: f64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: i64,
}

/// A memory with a retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: MemoryRecord,
    /// Max cosine similarity across the memory's chunks, clamped to [0, 1].
    pub score: f32,
}

/// A typed, weighted, directed edge between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(rename = "type")]
    pub relation: RelationType,
    pub weight: f64,
    pub creator: RelationCreator,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A (source, target, type) triple that must never be auto-suggested again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(rename = "type")]
    pub relation: RelationType,
    pub rejected_at: DateTime<Utc>,
}

/// Convert an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Cosine similarity between two vectors of equal length.
///
/// For L2-normalized vectors this is the dot product; non-normalized
/// inputs are divided by their norms.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have the same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// L2-normalize a vector, leaving the zero vector unchanged.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

/// Canonical form used for tag comparison. Tags stay case-preserving in
/// storage but compare case-insensitively.
pub fn tag_key(tag: &str) -> String {
    tag.to_lowercase()
}

/// RFC 3339 with fixed width and trailing `Z`, so string ordering matches
/// chronological ordering.
pub fn ts_to_str(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp from storage.
pub fn str_to_ts(s: &str) -> Result<DateTime<Utc>, MemoriaError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoriaError::Internal(format!("malformed timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrip() {
        for cat in MemoryCategory::ALL {
            assert_eq!(MemoryCategory::parse(cat.as_str()).unwrap(), cat);
        }
        assert!(MemoryCategory::parse("working").is_err());
    }

    #[test]
    fn relation_type_roundtrip() {
        let all = [
            RelationType::Causes,
            RelationType::Fixes,
            RelationType::Supports,
            RelationType::Opposes,
            RelationType::Follows,
            RelationType::Supersedes,
            RelationType::Derives,
            RelationType::PartOf,
            RelationType::Related,
        ];
        for rt in all {
            assert_eq!(RelationType::parse(rt.as_str()).unwrap(), rt);
        }
        assert!(RelationType::parse("near").is_err());
    }

    #[test]
    fn creator_rank_orders_user_first() {
        assert!(RelationCreator::User.rank() > RelationCreator::Auto.rank());
        assert!(RelationCreator::Auto.rank() > RelationCreator::System.rank());
    }

    #[test]
    fn blob_roundtrip() {
        let original = vec![0.1_f32, -0.5, 1.0, 0.0, 0.333];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), original.len() * 4);
        let recovered = blob_to_vec(&blob);
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_and_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);

        let c = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn l2_normalize_unit_length() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn tag_keys_fold_case() {
        assert_eq!(tag_key("Rust"), tag_key("rust"));
        assert_ne!(tag_key("rust"), tag_key("go"));
    }

    #[test]
    fn edge_serializes_type_field() {
        let edge = Edge {
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            relation: RelationType::PartOf,
            weight: 0.8,
            creator: RelationCreator::User,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["type"], "part_of");
        assert_eq!(json["creator"], "user");
    }
}
