// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store.
//!
//! Three logical collections (one per memory category) share a single
//! `points` table. Vectors are little-endian f32 BLOBs; similarity is
//! brute-force cosine computed in Rust over candidate rows. All access is
//! serialized through tokio-rusqlite's single background thread.

use std::path::Path;

use tokio_rusqlite::Connection;
use uuid::Uuid;

use memoria_core::types::{blob_to_vec, cosine_similarity, vec_to_blob, MemoryCategory};
use memoria_core::MemoriaError;

use crate::filter::PayloadFilter;
use crate::payload::{str_to_ts, ts_to_str, ChunkPayload, Point, SearchHit};

/// Helper to convert tokio_rusqlite errors into storage errors.
fn storage_err(e: tokio_rusqlite::Error) -> MemoriaError {
    MemoriaError::Storage {
        source: Box::new(e),
    }
}

/// Carry a decode failure out of a connection closure.
fn other_err(e: MemoriaError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e))
}

const POINT_COLUMNS: &str = "point_id, memory_id, chunk_index, chunk_count, vector, content, \
     tags, importance, category, created_at, updated_at, last_accessed_at, access_count, metadata";

/// Per-collection counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionStats {
    pub points: usize,
    pub memories: usize,
}

/// Store for chunk points across the three category collections.
pub struct VectorStore {
    conn: Connection,
    dimension: usize,
}

impl VectorStore {
    /// Open (or create) the vector database at `path` with dimension D.
    pub async fn open(path: &Path, dimension: usize) -> Result<Self, MemoriaError> {
        let conn = Connection::open(path).await.map_err(storage_err)?;
        let store = Self { conn, dimension };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store, used by tests.
    pub async fn open_in_memory(dimension: usize) -> Result<Self, MemoriaError> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        let store = Self { conn, dimension };
        store.init_schema().await?;
        Ok(store)
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn init_schema(&self) -> Result<(), MemoriaError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                    CREATE TABLE IF NOT EXISTS collections (
                        name TEXT PRIMARY KEY NOT NULL,
                        dimension INTEGER NOT NULL,
                        distance TEXT NOT NULL DEFAULT 'cosine',
                        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                    );
                    CREATE TABLE IF NOT EXISTS points (
                        point_id TEXT PRIMARY KEY NOT NULL,
                        collection TEXT NOT NULL,
                        memory_id TEXT NOT NULL,
                        chunk_index INTEGER NOT NULL,
                        chunk_count INTEGER NOT NULL,
                        vector BLOB NOT NULL,
                        content TEXT NOT NULL,
                        tags TEXT NOT NULL,
                        importance REAL NOT NULL,
                        category TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL,
                        last_accessed_at TEXT NOT NULL,
                        access_count INTEGER NOT NULL,
                        metadata TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_points_collection
                        ON points(collection);
                    CREATE INDEX IF NOT EXISTS idx_points_memory
                        ON points(collection, memory_id, chunk_index);",
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Create the collection row on first use; verify the dimension after.
    async fn ensure_collection(&self, collection: MemoryCategory) -> Result<(), MemoriaError> {
        let name = collection.as_str();
        let dimension = self.dimension;
        let existing: Option<i64> = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO collections (name, dimension) VALUES (?1, ?2)",
                    rusqlite::params![name, dimension as i64],
                )?;
                let dim = conn.query_row(
                    "SELECT dimension FROM collections WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get(0),
                )?;
                Ok(Some(dim))
            })
            .await
            .map_err(storage_err)?;

        match existing {
            Some(dim) if dim as usize == dimension => Ok(()),
            Some(dim) => Err(MemoriaError::Config(format!(
                "collection {name} has dimension {dim}, configured {dimension}"
            ))),
            None => Ok(()),
        }
    }

    /// Insert-or-replace points by `point_id`, atomically per call.
    pub async fn upsert(
        &self,
        collection: MemoryCategory,
        points: Vec<Point>,
    ) -> Result<(), MemoriaError> {
        for point in &points {
            if point.vector.len() != self.dimension {
                return Err(MemoriaError::InvalidInput(format!(
                    "point {} has vector dimension {}, collection expects {}",
                    point.id,
                    point.vector.len(),
                    self.dimension
                )));
            }
        }
        self.ensure_collection(collection).await?;

        let name = collection.as_str();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO points
                         (point_id, collection, memory_id, chunk_index, chunk_count, vector,
                          content, tags, importance, category, created_at, updated_at,
                          last_accessed_at, access_count, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    )?;
                    for point in &points {
                        let p = &point.payload;
                        stmt.execute(rusqlite::params![
                            point.id.to_string(),
                            name,
                            p.memory_id.to_string(),
                            p.chunk_index as i64,
                            p.chunk_count as i64,
                            vec_to_blob(&point.vector),
                            p.content,
                            serde_json::to_string(&p.tags).unwrap_or_else(|_| "[]".into()),
                            p.importance,
                            p.category.as_str(),
                            ts_to_str(&p.created_at),
                            ts_to_str(&p.updated_at),
                            ts_to_str(&p.last_accessed_at),
                            p.access_count,
                            serde_json::to_string(&p.metadata).unwrap_or_else(|_| "{}".into()),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Delete points by id. Returns the number of rows removed.
    pub async fn delete_by_ids(
        &self,
        collection: MemoryCategory,
        ids: &[Uuid],
    ) -> Result<usize, MemoriaError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let name = collection.as_str();
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.conn
            .call(move |conn| {
                let placeholders: Vec<String> =
                    (2..ids.len() + 2).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "DELETE FROM points WHERE collection = ?1 AND point_id IN ({})",
                    placeholders.join(", ")
                );
                let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&name];
                params.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));
                let removed = conn.execute(&sql, params.as_slice())?;
                Ok(removed)
            })
            .await
            .map_err(storage_err)
    }

    /// Delete every point whose payload matches the filter.
    pub async fn delete_by_filter(
        &self,
        collection: MemoryCategory,
        filter: &PayloadFilter,
    ) -> Result<usize, MemoriaError> {
        let matching = self.collect_ids(collection, filter).await?;
        self.delete_by_ids(collection, &matching).await
    }

    /// Delete all chunks of one memory. Returns the number of rows removed.
    pub async fn delete_memory(
        &self,
        collection: MemoryCategory,
        memory_id: Uuid,
    ) -> Result<usize, MemoriaError> {
        let name = collection.as_str();
        let memory_id = memory_id.to_string();
        self.conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM points WHERE collection = ?1 AND memory_id = ?2",
                    rusqlite::params![name, memory_id],
                )?;
                Ok(removed)
            })
            .await
            .map_err(storage_err)
    }

    /// Fetch a single point by id.
    pub async fn get(
        &self,
        collection: MemoryCategory,
        id: Uuid,
    ) -> Result<Option<Point>, MemoriaError> {
        let name = collection.as_str();
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {POINT_COLUMNS} FROM points WHERE collection = ?1 AND point_id = ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query_map(rusqlite::params![name, id], row_to_point)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?.map_err(other_err)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(storage_err)
    }

    /// Fetch several points by id, in no particular order.
    pub async fn get_many(
        &self,
        collection: MemoryCategory,
        ids: &[Uuid],
    ) -> Result<Vec<Point>, MemoriaError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let name = collection.as_str();
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.conn
            .call(move |conn| {
                let placeholders: Vec<String> =
                    (2..ids.len() + 2).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT {POINT_COLUMNS} FROM points
                     WHERE collection = ?1 AND point_id IN ({})",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&name];
                params.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));
                let points = stmt
                    .query_map(params.as_slice(), row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .collect::<Result<Vec<_>, MemoriaError>>()
                    .map_err(other_err)?;
                Ok(points)
            })
            .await
            .map_err(storage_err)
    }

    /// Cosine-similarity search. Scores are clamped to [0, 1]; results are
    /// sorted descending with distinct point ids and may number fewer than
    /// `k`.
    pub async fn search(
        &self,
        collection: MemoryCategory,
        query: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<SearchHit>, MemoriaError> {
        if query.len() != self.dimension {
            return Err(MemoriaError::InvalidInput(format!(
                "query vector dimension {} does not match collection dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let candidates = self.load_collection(collection).await?;
        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|point| filter.is_none_or(|f| f.matches(&point.payload)))
            .map(|point| SearchHit {
                score: cosine_similarity(query, &point.vector).max(0.0),
                id: point.id,
                payload: point.payload,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Paginated iteration for maintenance. Returns matching points and the
    /// cursor for the next page, or `None` when the collection is exhausted.
    pub async fn scroll(
        &self,
        collection: MemoryCategory,
        filter: Option<&PayloadFilter>,
        cursor: Option<Uuid>,
        limit: usize,
    ) -> Result<(Vec<Point>, Option<Uuid>), MemoriaError> {
        let name = collection.as_str();
        let after = cursor.map(|c| c.to_string()).unwrap_or_default();
        let fetch = limit.max(1);
        let page: Vec<Point> = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {POINT_COLUMNS} FROM points
                     WHERE collection = ?1 AND point_id > ?2
                     ORDER BY point_id ASC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let points = stmt
                    .query_map(rusqlite::params![name, after, fetch as i64], row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .collect::<Result<Vec<_>, MemoriaError>>()
                    .map_err(other_err)?;
                Ok(points)
            })
            .await
            .map_err(storage_err)?;

        let next_cursor = if page.len() < fetch {
            None
        } else {
            page.last().map(|p| p.id)
        };
        let matching = match filter {
            Some(f) => page.into_iter().filter(|p| f.matches(&p.payload)).collect(),
            None => page,
        };
        Ok((matching, next_cursor))
    }

    /// Chunk 0 of a memory, if the memory lives in this collection.
    pub async fn chunk_zero(
        &self,
        collection: MemoryCategory,
        memory_id: Uuid,
    ) -> Result<Option<Point>, MemoriaError> {
        let name = collection.as_str();
        let memory_id = memory_id.to_string();
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {POINT_COLUMNS} FROM points
                     WHERE collection = ?1 AND memory_id = ?2 AND chunk_index = 0"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query_map(rusqlite::params![name, memory_id], row_to_point)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?.map_err(other_err)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(storage_err)
    }

    /// All chunks of a memory ordered by `chunk_index`.
    pub async fn chunks_of(
        &self,
        collection: MemoryCategory,
        memory_id: Uuid,
    ) -> Result<Vec<Point>, MemoriaError> {
        let name = collection.as_str();
        let memory_id = memory_id.to_string();
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {POINT_COLUMNS} FROM points
                     WHERE collection = ?1 AND memory_id = ?2
                     ORDER BY chunk_index ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let points = stmt
                    .query_map(rusqlite::params![name, memory_id], row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .collect::<Result<Vec<_>, MemoriaError>>()
                    .map_err(other_err)?;
                Ok(points)
            })
            .await
            .map_err(storage_err)
    }

    /// Locate the collection holding a memory, if any.
    pub async fn find_memory(
        &self,
        memory_id: Uuid,
    ) -> Result<Option<MemoryCategory>, MemoriaError> {
        let memory_id = memory_id.to_string();
        let category: Option<String> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT collection FROM points
                         WHERE memory_id = ?1 AND chunk_index = 0 LIMIT 1",
                        rusqlite::params![memory_id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                Ok(row)
            })
            .await
            .map_err(storage_err)?;
        category.map(|name| MemoryCategory::parse(&name)).transpose()
    }

    /// Point and memory counts for one collection.
    pub async fn stats(
        &self,
        collection: MemoryCategory,
    ) -> Result<CollectionStats, MemoriaError> {
        let name = collection.as_str();
        self.conn
            .call(move |conn| {
                let (points, memories): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT memory_id)
                     FROM points WHERE collection = ?1",
                    rusqlite::params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(CollectionStats {
                    points: points as usize,
                    memories: memories as usize,
                })
            })
            .await
            .map_err(storage_err)
    }

    async fn load_collection(
        &self,
        collection: MemoryCategory,
    ) -> Result<Vec<Point>, MemoriaError> {
        let name = collection.as_str();
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {POINT_COLUMNS} FROM points WHERE collection = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let points = stmt
                    .query_map(rusqlite::params![name], row_to_point)?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .collect::<Result<Vec<_>, MemoriaError>>()
                    .map_err(other_err)?;
                Ok(points)
            })
            .await
            .map_err(storage_err)
    }

    async fn collect_ids(
        &self,
        collection: MemoryCategory,
        filter: &PayloadFilter,
    ) -> Result<Vec<Uuid>, MemoriaError> {
        let mut ids = Vec::new();
        let mut cursor = None;
        loop {
            let (page, next) = self.scroll(collection, Some(filter), cursor, 500).await?;
            ids.extend(page.into_iter().map(|p| p.id));
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(ids)
    }
}

type PointParseResult = Result<Point, MemoriaError>;

/// Decode one `points` row. Payload decode failures surface as internal
/// errors rather than silently dropping the row.
fn row_to_point(row: &rusqlite::Row) -> rusqlite::Result<PointParseResult> {
    let point_id: String = row.get(0)?;
    let memory_id: String = row.get(1)?;
    let chunk_index: i64 = row.get(2)?;
    let chunk_count: i64 = row.get(3)?;
    let vector: Vec<u8> = row.get(4)?;
    let content: String = row.get(5)?;
    let tags: String = row.get(6)?;
    let importance: f64 = row.get(7)?;
    let category: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let last_accessed_at: String = row.get(11)?;
    let access_count: i64 = row.get(12)?;
    let metadata: String = row.get(13)?;

    Ok(build_point(
        point_id,
        memory_id,
        chunk_index,
        chunk_count,
        vector,
        content,
        tags,
        importance,
        category,
        created_at,
        updated_at,
        last_accessed_at,
        access_count,
        metadata,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_point(
    point_id: String,
    memory_id: String,
    chunk_index: i64,
    chunk_count: i64,
    vector: Vec<u8>,
    content: String,
    tags: String,
    importance: f64,
    category: String,
    created_at: String,
    updated_at: String,
    last_accessed_at: String,
    access_count: i64,
    metadata: String,
) -> PointParseResult {
    let parse_uuid = |s: &str| {
        Uuid::parse_str(s).map_err(|e| MemoriaError::Internal(format!("malformed uuid {s:?}: {e}")))
    };
    Ok(Point {
        id: parse_uuid(&point_id)?,
        vector: blob_to_vec(&vector),
        payload: ChunkPayload {
            memory_id: parse_uuid(&memory_id)?,
            chunk_index: chunk_index as u32,
            chunk_count: chunk_count as u32,
            content,
            tags: serde_json::from_str(&tags)
                .map_err(|e| MemoriaError::Internal(format!("malformed tags: {e}")))?,
            importance,
            category: MemoryCategory::parse(&category)?,
            created_at: str_to_ts(&created_at)?,
            updated_at: str_to_ts(&updated_at)?,
            last_accessed_at: str_to_ts(&last_accessed_at)?,
            access_count,
            metadata: serde_json::from_str(&metadata)
                .map_err(|e| MemoriaError::Internal(format!("malformed metadata: {e}")))?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memoria_core::types::Metadata;
    use serde_json::json;

    fn point(memory_id: Uuid, chunk_index: u32, chunk_count: u32, vector: Vec<f32>) -> Point {
        let now = Utc::now();
        Point {
            id: Uuid::new_v4(),
            vector,
            payload: ChunkPayload {
                memory_id,
                chunk_index,
                chunk_count,
                content: format!("chunk {chunk_index}"),
                tags: vec!["test".into()],
                importance: 0.5,
                category: MemoryCategory::Semantic,
                created_at: now,
                updated_at: now,
                last_accessed_at: now,
                access_count: 0,
                metadata: Metadata::new(),
            },
        }
    }

    async fn store() -> VectorStore {
        VectorStore::open_in_memory(3).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrip() {
        let store = store().await;
        let memory = Uuid::new_v4();
        let p = point(memory, 0, 1, vec![1.0, 0.0, 0.0]);
        let id = p.id;
        store.upsert(MemoryCategory::Semantic, vec![p]).await.unwrap();

        let fetched = store.get(MemoryCategory::Semantic, id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.payload.memory_id, memory);
        assert_eq!(fetched.vector, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_point_id() {
        let store = store().await;
        let memory = Uuid::new_v4();
        let mut p = point(memory, 0, 1, vec![1.0, 0.0, 0.0]);
        let id = p.id;
        store
            .upsert(MemoryCategory::Semantic, vec![p.clone()])
            .await
            .unwrap();

        p.payload.content = "replaced".into();
        store.upsert(MemoryCategory::Semantic, vec![p]).await.unwrap();

        let fetched = store.get(MemoryCategory::Semantic, id).await.unwrap().unwrap();
        assert_eq!(fetched.payload.content, "replaced");
        assert_eq!(
            store.stats(MemoryCategory::Semantic).await.unwrap().points,
            1
        );
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let store = store().await;
        let p = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0]);
        let err = store
            .upsert(MemoryCategory::Semantic, vec![p])
            .await
            .unwrap_err();
        assert!(matches!(err, MemoriaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn get_many_fetches_known_ids() {
        let store = store().await;
        let p1 = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]);
        let p2 = point(Uuid::new_v4(), 0, 1, vec![0.0, 1.0, 0.0]);
        let (id1, id2) = (p1.id, p2.id);
        store.upsert(MemoryCategory::Semantic, vec![p1, p2]).await.unwrap();

        let points = store
            .get_many(MemoryCategory::Semantic, &[id1, id2, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(points.len(), 2, "unknown ids are simply absent");

        let none = store.get_many(MemoryCategory::Semantic, &[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = store().await;
        let close = point(Uuid::new_v4(), 0, 1, vec![0.9, 0.1, 0.0]);
        let far = point(Uuid::new_v4(), 0, 1, vec![0.0, 0.0, 1.0]);
        let close_id = close.id;
        store
            .upsert(MemoryCategory::Semantic, vec![close, far])
            .await
            .unwrap();

        let hits = store
            .search(MemoryCategory::Semantic, &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, close_id);
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    }

    #[tokio::test]
    async fn search_negative_cosine_clamps_to_zero() {
        let store = store().await;
        let opposite = point(Uuid::new_v4(), 0, 1, vec![-1.0, 0.0, 0.0]);
        store
            .upsert(MemoryCategory::Semantic, vec![opposite])
            .await
            .unwrap();
        let hits = store
            .search(MemoryCategory::Semantic, &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn search_respects_filter_and_k() {
        let store = store().await;
        let mut tagged = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]);
        tagged.payload.tags = vec!["keep".into()];
        let untagged = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]);
        store
            .upsert(MemoryCategory::Semantic, vec![tagged.clone(), untagged])
            .await
            .unwrap();

        let filter = PayloadFilter::new().contains_any("tags", vec!["keep".into()]);
        let hits = store
            .search(MemoryCategory::Semantic, &[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, tagged.id);

        let hits = store
            .search(MemoryCategory::Semantic, &[1.0, 0.0, 0.0], 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = store().await;
        let semantic = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]);
        store
            .upsert(MemoryCategory::Semantic, vec![semantic])
            .await
            .unwrap();

        let hits = store
            .search(MemoryCategory::Episodic, &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn chunks_of_orders_by_index() {
        let store = store().await;
        let memory = Uuid::new_v4();
        let c1 = point(memory, 1, 3, vec![0.0, 1.0, 0.0]);
        let c0 = point(memory, 0, 3, vec![1.0, 0.0, 0.0]);
        let c2 = point(memory, 2, 3, vec![0.0, 0.0, 1.0]);
        store
            .upsert(MemoryCategory::Semantic, vec![c1, c0, c2])
            .await
            .unwrap();

        let chunks = store.chunks_of(MemoryCategory::Semantic, memory).await.unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.payload.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let zero = store
            .chunk_zero(MemoryCategory::Semantic, memory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(zero.payload.chunk_index, 0);
    }

    #[tokio::test]
    async fn delete_memory_removes_all_chunks() {
        let store = store().await;
        let memory = Uuid::new_v4();
        store
            .upsert(
                MemoryCategory::Semantic,
                vec![
                    point(memory, 0, 2, vec![1.0, 0.0, 0.0]),
                    point(memory, 1, 2, vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let removed = store.delete_memory(MemoryCategory::Semantic, memory).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store
            .chunk_zero(MemoryCategory::Semantic, memory)
            .await
            .unwrap()
            .is_none());

        // Idempotent.
        let removed = store.delete_memory(MemoryCategory::Semantic, memory).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn delete_by_filter_uses_payload_predicates() {
        let store = store().await;
        let mut low = point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]);
        low.payload.importance = 0.1;
        let mut high = point(Uuid::new_v4(), 0, 1, vec![0.0, 1.0, 0.0]);
        high.payload.importance = 0.9;
        store
            .upsert(MemoryCategory::Semantic, vec![low, high.clone()])
            .await
            .unwrap();

        let filter = PayloadFilter::new().range("importance", None, Some(json!(0.5)));
        let removed = store
            .delete_by_filter(MemoryCategory::Semantic, &filter)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(MemoryCategory::Semantic, high.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scroll_paginates_whole_collection() {
        let store = store().await;
        let points: Vec<Point> = (0..25)
            .map(|_| point(Uuid::new_v4(), 0, 1, vec![1.0, 0.0, 0.0]))
            .collect();
        store.upsert(MemoryCategory::Semantic, points).await.unwrap();

        let mut seen = 0;
        let mut cursor = None;
        loop {
            let (page, next) = store
                .scroll(MemoryCategory::Semantic, None, cursor, 10)
                .await
                .unwrap();
            seen += page.len();
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        assert_eq!(seen, 25);
    }

    #[tokio::test]
    async fn find_memory_locates_collection() {
        let store = store().await;
        let memory = Uuid::new_v4();
        let mut p = point(memory, 0, 1, vec![1.0, 0.0, 0.0]);
        p.payload.category = MemoryCategory::Procedural;
        store.upsert(MemoryCategory::Procedural, vec![p]).await.unwrap();

        assert_eq!(
            store.find_memory(memory).await.unwrap(),
            Some(MemoryCategory::Procedural)
        );
        assert_eq!(store.find_memory(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stats_count_points_and_memories() {
        let store = store().await;
        let memory = Uuid::new_v4();
        store
            .upsert(
                MemoryCategory::Semantic,
                vec![
                    point(memory, 0, 2, vec![1.0, 0.0, 0.0]),
                    point(memory, 1, 2, vec![0.0, 1.0, 0.0]),
                    point(Uuid::new_v4(), 0, 1, vec![0.0, 0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let stats = store.stats(MemoryCategory::Semantic).await.unwrap();
        assert_eq!(stats.points, 3);
        assert_eq!(stats.memories, 2);
    }
}
