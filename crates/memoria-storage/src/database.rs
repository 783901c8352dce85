// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! embedded migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The `Database` struct IS the single writer; query modules accept
//! `&Database` and call through `connection().call()`. Do NOT create
//! additional Connection instances for writes.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use memoria_core::MemoriaError;

use crate::migrations::run_migrations;

/// Helper to convert tokio_rusqlite errors into storage errors.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> MemoriaError {
    MemoriaError::Storage {
        source: Box::new(e),
    }
}

/// Carry a typed error out of a connection closure.
pub(crate) fn other_err(e: MemoriaError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e))
}

/// The single-writer handle to the relational store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the graph database at `path`, apply PRAGMAs, and
    /// run pending migrations.
    pub async fn open(path: &Path, wal_mode: bool) -> Result<Self, MemoriaError> {
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        Ok(db)
    }

    /// Open an in-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, MemoriaError> {
        let conn = Connection::open_in_memory().await.map_err(map_tr_err)?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), MemoriaError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                run_migrations(conn).map_err(other_err)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("graph database initialized");
        Ok(())
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_create_graph_tables() {
        let db = Database::open_in_memory().await.unwrap();
        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();

        assert!(tables.contains(&"memory_relations".to_string()));
        assert!(tables.contains(&"rejected_suggestions".to_string()));
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");

        let db = Database::open(&path, true).await.unwrap();
        drop(db);
        // Second open must not re-apply V1.
        Database::open(&path, true).await.unwrap();
    }
}
