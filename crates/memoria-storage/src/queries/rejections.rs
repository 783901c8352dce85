// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rejection ledger: (source, target, type) triples the user refused.

use rusqlite::params;
use uuid::Uuid;

use memoria_core::types::{str_to_ts, ts_to_str, Rejection, RelationType};
use memoria_core::MemoriaError;

use crate::database::{map_tr_err, other_err, Database};

/// Record a rejection. Fails with `DuplicateRejection` if the triple is
/// already recorded.
pub async fn record_rejection(
    db: &Database,
    rejection: &Rejection,
) -> Result<(), MemoriaError> {
    let source = rejection.source_id;
    let target = rejection.target_id;
    let relation = rejection.relation;
    let rejected_at = ts_to_str(&rejection.rejected_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO rejected_suggestions
                 (source_id, target_id, relation_type, rejected_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    source.to_string(),
                    target.to_string(),
                    relation.as_str(),
                    rejected_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| match &e {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(_, Some(msg)))
                if msg.contains("UNIQUE constraint failed") =>
            {
                MemoriaError::DuplicateRejection {
                    source_id: source,
                    target,
                    relation: relation.as_str().to_string(),
                }
            }
            _ => map_tr_err(e),
        })
}

/// Whether a triple is in the ledger.
pub async fn is_rejected(
    db: &Database,
    source: Uuid,
    target: Uuid,
    relation: RelationType,
) -> Result<bool, MemoriaError> {
    let source = source.to_string();
    let target = target.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM rejected_suggestions
                 WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3",
                params![source, target, relation.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// The whole ledger, for suggestion filtering and export.
pub async fn all_rejections(db: &Database) -> Result<Vec<Rejection>, MemoriaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_id, target_id, relation_type, rejected_at
                 FROM rejected_suggestions ORDER BY rejected_at ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let rejections = rows
                .into_iter()
                .map(|(source, target, relation, rejected_at)| {
                    let parse_uuid = |s: &str| {
                        Uuid::parse_str(s).map_err(|e| {
                            MemoriaError::Internal(format!("malformed uuid {s:?}: {e}"))
                        })
                    };
                    Ok(Rejection {
                        source_id: parse_uuid(&source)?,
                        target_id: parse_uuid(&target)?,
                        relation: RelationType::parse(&relation)?,
                        rejected_at: str_to_ts(&rejected_at)?,
                    })
                })
                .collect::<Result<Vec<_>, MemoriaError>>()
                .map_err(other_err)?;
            Ok(rejections)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a rejection so the triple may be suggested again.
pub async fn delete_rejection(
    db: &Database,
    source: Uuid,
    target: Uuid,
    relation: RelationType,
) -> Result<bool, MemoriaError> {
    let source = source.to_string();
    let target = target.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM rejected_suggestions
                 WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3",
                params![source, target, relation.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rejection(source: Uuid, target: Uuid) -> Rejection {
        Rejection {
            source_id: source,
            target_id: target,
            relation: RelationType::Related,
            rejected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_and_check() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(!is_rejected(&db, a, b, RelationType::Related).await.unwrap());
        record_rejection(&db, &rejection(a, b)).await.unwrap();
        assert!(is_rejected(&db, a, b, RelationType::Related).await.unwrap());

        // Other types and directions are unaffected.
        assert!(!is_rejected(&db, a, b, RelationType::Fixes).await.unwrap());
        assert!(!is_rejected(&db, b, a, RelationType::Related).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_rejection_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        record_rejection(&db, &rejection(a, b)).await.unwrap();

        let err = record_rejection(&db, &rejection(a, b)).await.unwrap_err();
        assert!(matches!(err, MemoriaError::DuplicateRejection { .. }));
    }

    #[tokio::test]
    async fn delete_reenables_the_triple() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        record_rejection(&db, &rejection(a, b)).await.unwrap();

        assert!(delete_rejection(&db, a, b, RelationType::Related).await.unwrap());
        assert!(!is_rejected(&db, a, b, RelationType::Related).await.unwrap());
        assert!(!delete_rejection(&db, a, b, RelationType::Related).await.unwrap());
    }

    #[tokio::test]
    async fn ledger_lists_all_triples() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        record_rejection(&db, &rejection(a, b)).await.unwrap();
        record_rejection(&db, &rejection(b, c)).await.unwrap();

        let all = all_rejections(&db).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
