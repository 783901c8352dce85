// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Point payloads: the denormalized memory fields carried by every chunk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use memoria_core::types::{MemoryCategory, MemoryRecord, Metadata};

pub use memoria_core::types::{str_to_ts, ts_to_str};

/// Payload stored alongside each chunk vector.
///
/// All chunks of one memory share identical fields except `content` and
/// `chunk_index`: chunk 0 carries the full original content, later chunks
/// carry their window text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// The logical memory this chunk belongs to (parent id).
    pub memory_id: Uuid,
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: f64,
    pub category: MemoryCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ChunkPayload {
    /// Build the logical memory record from a chunk-0 payload.
    pub fn to_record(&self) -> MemoryRecord {
        MemoryRecord {
            id: self.memory_id,
            category: self.category,
            content: self.content.clone(),
            tags: self.tags.clone(),
            importance: self.importance,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
        }
    }
}

/// One physical point in a collection.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search result: point id, similarity score in [0, 1], and its payload.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_roundtrip_preserves_ordering() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(90);

        let a = ts_to_str(&earlier);
        let b = ts_to_str(&later);
        assert!(a < b, "string order must match time order");

        assert_eq!(str_to_ts(&a).unwrap(), str_to_ts(&a).unwrap());
        assert!(str_to_ts(&b).unwrap() > str_to_ts(&a).unwrap());
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        assert!(str_to_ts("yesterday").is_err());
    }

    #[test]
    fn record_from_chunk_zero_payload() {
        let now = Utc::now();
        let payload = ChunkPayload {
            memory_id: Uuid::new_v4(),
            chunk_index: 0,
            chunk_count: 3,
            content: "the full original text".into(),
            tags: vec!["stack".into()],
            importance: 0.8,
            category: MemoryCategory::Semantic,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 2,
            metadata: Metadata::new(),
        };
        let record = payload.to_record();
        assert_eq!(record.id, payload.memory_id);
        assert_eq!(record.content, "the full original text");
        assert_eq!(record.category, MemoryCategory::Semantic);
        assert_eq!(record.access_count, 2);
    }
}
