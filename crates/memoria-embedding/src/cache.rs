// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent SQLite-backed embedding cache.
//!
//! Keys are SHA-256 over (model, dimension, normalized text); values are the
//! raw f32 vectors as BLOBs. Lookups and writes go through tokio-rusqlite's
//! single background thread, so the cache is safe for concurrent callers;
//! a lost `touch` is acceptable because the value is a pure function of the
//! key.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use memoria_core::types::{blob_to_vec, vec_to_blob};
use memoria_core::MemoriaError;

/// Helper to convert tokio_rusqlite errors into storage errors.
fn storage_err(e: tokio_rusqlite::Error) -> MemoriaError {
    MemoriaError::Storage {
        source: Box::new(e),
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    /// Approximate stored vector bytes.
    pub vector_bytes: u64,
    pub models: Vec<(String, usize)>,
}

/// Persistent key→vector store for computed embeddings.
pub struct EmbeddingCache {
    conn: Connection,
}

impl EmbeddingCache {
    /// Open (or create) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self, MemoriaError> {
        let conn = Connection::open(path).await.map_err(storage_err)?;
        let cache = Self { conn };
        cache.init_schema().await?;
        Ok(cache)
    }

    /// Open an in-memory cache, used by tests.
    pub async fn open_in_memory() -> Result<Self, MemoriaError> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        let cache = Self { conn };
        cache.init_schema().await?;
        Ok(cache)
    }

    async fn init_schema(&self) -> Result<(), MemoriaError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS embeddings (
                        hash TEXT PRIMARY KEY NOT NULL,
                        model TEXT NOT NULL,
                        dimensions INTEGER NOT NULL,
                        vector BLOB NOT NULL,
                        text_preview TEXT,
                        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                        last_used_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                        hits INTEGER NOT NULL DEFAULT 1
                    );
                    CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model);
                    CREATE INDEX IF NOT EXISTS idx_embeddings_last_used ON embeddings(last_used_at);",
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Look up a vector. Returns `None` on miss, and never returns a vector
    /// whose stored dimension differs from `dimension`. Hits bump
    /// `last_used_at` and the hit counter.
    pub async fn get(
        &self,
        text: &str,
        model: &str,
        dimension: usize,
    ) -> Result<Option<Vec<f32>>, MemoriaError> {
        let hash = cache_key(text, model, dimension);
        self.conn
            .call(move |conn| {
                let row: Option<(Vec<u8>, i64)> = conn
                    .query_row(
                        "SELECT vector, dimensions FROM embeddings WHERE hash = ?1",
                        rusqlite::params![hash],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                match row {
                    Some((blob, dims)) if dims as usize == dimension => {
                        conn.execute(
                            "UPDATE embeddings
                             SET last_used_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                                 hits = hits + 1
                             WHERE hash = ?1",
                            rusqlite::params![hash],
                        )
                        .ok(); // touch is best-effort
                        Ok(Some(blob_to_vec(&blob)))
                    }
                    _ => Ok(None),
                }
            })
            .await
            .map_err(storage_err)
    }

    /// Store a vector. Idempotent: re-putting the same key replaces the row.
    pub async fn put(
        &self,
        text: &str,
        model: &str,
        dimension: usize,
        vector: &[f32],
    ) -> Result<(), MemoriaError> {
        let hash = cache_key(text, model, dimension);
        let model = model.to_string();
        let preview: String = text.chars().take(200).collect();
        let blob = vec_to_blob(vector);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO embeddings
                     (hash, model, dimensions, vector, text_preview, created_at, last_used_at, hits)
                     VALUES (?1, ?2, ?3, ?4, ?5,
                             strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                             strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                             COALESCE((SELECT hits FROM embeddings WHERE hash = ?1), 1))",
                    rusqlite::params![hash, model, dimension as i64, blob, preview],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Mark an entry as recently used without reading it. Best effort:
    /// touching an absent key is a no-op.
    pub async fn touch(
        &self,
        text: &str,
        model: &str,
        dimension: usize,
    ) -> Result<(), MemoriaError> {
        let hash = cache_key(text, model, dimension);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE embeddings
                     SET last_used_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE hash = ?1",
                    rusqlite::params![hash],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Number of cached entries.
    pub async fn size(&self) -> Result<usize, MemoriaError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(storage_err)
    }

    /// Evict the `n` least-recently-used entries. Returns how many were
    /// removed.
    pub async fn evict(&self, n: usize) -> Result<usize, MemoriaError> {
        self.conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM embeddings WHERE hash IN (
                         SELECT hash FROM embeddings ORDER BY last_used_at ASC LIMIT ?1
                     )",
                    rusqlite::params![n as i64],
                )?;
                Ok(removed)
            })
            .await
            .map_err(storage_err)
    }

    /// Shrink the cache to at most `max_entries` rows, LRU first.
    /// `max_entries == 0` means unbounded and is a no-op.
    pub async fn prune_to(&self, max_entries: usize) -> Result<usize, MemoriaError> {
        if max_entries == 0 {
            return Ok(0);
        }
        let current = self.size().await?;
        if current <= max_entries {
            return Ok(0);
        }
        let removed = self.evict(current - max_entries).await?;
        debug!(removed, max_entries, "pruned embedding cache");
        Ok(removed)
    }

    /// Aggregate statistics for diagnostics.
    pub async fn stats(&self) -> Result<CacheStats, MemoriaError> {
        self.conn
            .call(|conn| {
                let entries: i64 =
                    conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
                let vector_bytes: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(vector)), 0) FROM embeddings",
                    [],
                    |row| row.get(0),
                )?;
                let mut stmt =
                    conn.prepare("SELECT model, COUNT(*) FROM embeddings GROUP BY model")?;
                let models = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CacheStats {
                    entries: entries as usize,
                    vector_bytes: vector_bytes as u64,
                    models,
                })
            })
            .await
            .map_err(storage_err)
    }
}

/// Cache key: SHA-256 over model, dimension, and the normalized text.
pub fn cache_key(text: &str, model: &str, dimension: usize) -> String {
    let material = format!("{model}\u{1f}{dimension}\u{1f}{text}");
    let digest = ring::digest::digest(&ring::digest::SHA256, material.as_bytes());
    digest
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit_roundtrip() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        let vector: Vec<f32> = (0..8).map(|i| i as f32 / 8.0).collect();

        assert!(cache.get("hello", "test-model", 8).await.unwrap().is_none());
        cache.put("hello", "test-model", 8, &vector).await.unwrap();

        let hit = cache.get("hello", "test-model", 8).await.unwrap().unwrap();
        assert_eq!(hit.len(), 8);
        for (a, b) in vector.iter().zip(hit.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_miss() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("hello", "m", 4, &[0.1, 0.2, 0.3, 0.4]).await.unwrap();
        assert!(cache.get("hello", "m", 8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn model_is_part_of_the_key() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("hello", "model-a", 2, &[1.0, 0.0]).await.unwrap();
        assert!(cache.get("hello", "model-b", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("hello", "m", 2, &[1.0, 0.0]).await.unwrap();
        cache.put("hello", "m", 2, &[1.0, 0.0]).await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn evict_removes_least_recently_used() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("first", "m", 2, &[1.0, 0.0]).await.unwrap();
        // Distinct last_used_at values require a tick between writes.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.put("second", "m", 2, &[0.0, 1.0]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        // Touch "first" so "second" becomes the LRU entry.
        cache.get("first", "m", 2).await.unwrap();

        let removed = cache.evict(1).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("first", "m", 2).await.unwrap().is_some());
        assert!(cache.get("second", "m", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_refreshes_recency() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("old", "m", 2, &[1.0, 0.0]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.put("new", "m", 2, &[0.0, 1.0]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        cache.touch("old", "m", 2).await.unwrap();
        cache.evict(1).await.unwrap();
        assert!(cache.get("old", "m", 2).await.unwrap().is_some());
        assert!(cache.get("new", "m", 2).await.unwrap().is_none());

        // Touching a missing key is a no-op.
        cache.touch("absent", "m", 2).await.unwrap();
    }

    #[tokio::test]
    async fn prune_to_bounds_the_cache() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        for i in 0..10 {
            cache
                .put(&format!("entry-{i}"), "m", 2, &[i as f32, 0.0])
                .await
                .unwrap();
        }
        let removed = cache.prune_to(4).await.unwrap();
        assert_eq!(removed, 6);
        assert_eq!(cache.size().await.unwrap(), 4);

        // 0 means unbounded.
        assert_eq!(cache.prune_to(0).await.unwrap(), 0);
        assert_eq!(cache.size().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn stats_report_entries_and_models() {
        let cache = EmbeddingCache::open_in_memory().await.unwrap();
        cache.put("a", "model-a", 2, &[1.0, 0.0]).await.unwrap();
        cache.put("b", "model-a", 2, &[0.0, 1.0]).await.unwrap();
        cache.put("c", "model-b", 2, &[1.0, 1.0]).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.vector_bytes, 3 * 2 * 4);
        assert_eq!(stats.models.len(), 2);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let cache = EmbeddingCache::open(&path).await.unwrap();
        cache.put("persisted", "m", 2, &[0.5, 0.5]).await.unwrap();
        drop(cache);

        let reopened = EmbeddingCache::open(&path).await.unwrap();
        assert!(reopened.get("persisted", "m", 2).await.unwrap().is_some());
    }

    #[test]
    fn key_is_stable_and_discriminating() {
        let a = cache_key("text", "m", 768);
        assert_eq!(a, cache_key("text", "m", 768));
        assert_ne!(a, cache_key("text", "m", 384));
        assert_ne!(a, cache_key("text", "other", 768));
        assert_ne!(a, cache_key("other", "m", 768));
        assert_eq!(a.len(), 64);
    }
}
