// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edge CRUD over the `memory_relations` table.

use rusqlite::params;
use uuid::Uuid;

use memoria_core::types::{str_to_ts, ts_to_str, Direction, Edge, RelationCreator, RelationType};
use memoria_core::MemoriaError;

use crate::database::{map_tr_err, other_err, Database};
use crate::models::{BulkInsertReport, RelationCounts};

const EDGE_COLUMNS: &str =
    "source_id, target_id, relation_type, weight, created_by, created_at, metadata";

/// Decode one `memory_relations` row.
fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Result<Edge, MemoriaError>> {
    let source_id: String = row.get(0)?;
    let target_id: String = row.get(1)?;
    let relation: String = row.get(2)?;
    let weight: f64 = row.get(3)?;
    let created_by: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let metadata: String = row.get(6)?;

    let build = move || -> Result<Edge, MemoriaError> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s)
                .map_err(|e| MemoriaError::Internal(format!("malformed uuid {s:?}: {e}")))
        };
        Ok(Edge {
            source_id: parse_uuid(&source_id)?,
            target_id: parse_uuid(&target_id)?,
            relation: RelationType::parse(&relation)?,
            weight,
            creator: RelationCreator::parse(&created_by)?,
            created_at: str_to_ts(&created_at)?,
            metadata: serde_json::from_str(&metadata)
                .map_err(|e| MemoriaError::Internal(format!("malformed edge metadata: {e}")))?,
        })
    };
    Ok(build())
}

fn collect_edges(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Edge>, tokio_rusqlite::Error> {
    let edges = stmt
        .query_map(params, row_to_edge)
        .map_err(tokio_rusqlite::Error::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(tokio_rusqlite::Error::from)?
        .into_iter()
        .collect::<Result<Vec<_>, MemoriaError>>()
        .map_err(other_err)?;
    Ok(edges)
}

/// Insert one edge. Fails with `SelfLoop` when source equals target and
/// with `DuplicateEdge` when the (source, target, type) triple exists.
pub async fn insert_edge(db: &Database, edge: &Edge) -> Result<(), MemoriaError> {
    if edge.source_id == edge.target_id {
        return Err(MemoriaError::SelfLoop(edge.source_id));
    }
    let source = edge.source_id;
    let target = edge.target_id;
    let relation = edge.relation;
    let edge = edge.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO memory_relations
                 (source_id, target_id, relation_type, weight, created_by, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    edge.source_id.to_string(),
                    edge.target_id.to_string(),
                    edge.relation.as_str(),
                    edge.weight,
                    edge.creator.as_str(),
                    ts_to_str(&edge.created_at),
                    serde_json::to_string(&edge.metadata).unwrap_or_else(|_| "{}".into()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| match &e {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(_, Some(msg)))
                if msg.contains("UNIQUE constraint failed") =>
            {
                MemoriaError::DuplicateEdge {
                    source_id: source,
                    target,
                    relation: relation.as_str().to_string(),
                }
            }
            _ => map_tr_err(e),
        })
}

/// Insert many edges, counting outcomes instead of failing fast.
pub async fn bulk_insert_edges(
    db: &Database,
    edges: &[Edge],
) -> Result<BulkInsertReport, MemoriaError> {
    let mut report = BulkInsertReport::default();
    for edge in edges {
        match insert_edge(db, edge).await {
            Ok(()) => report.created += 1,
            Err(MemoriaError::DuplicateEdge { .. }) => report.duplicates += 1,
            Err(MemoriaError::Storage { .. }) | Err(MemoriaError::Internal(_)) => {
                report.errors += 1
            }
            Err(MemoriaError::SelfLoop(_)) | Err(MemoriaError::InvalidInput(_)) => {
                report.errors += 1
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Fetch one edge by its unique triple.
pub async fn get_edge(
    db: &Database,
    source: Uuid,
    target: Uuid,
    relation: RelationType,
) -> Result<Option<Edge>, MemoriaError> {
    let source = source.to_string();
    let target = target.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {EDGE_COLUMNS} FROM memory_relations
                 WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let edges = collect_edges(
                &mut stmt,
                &[&source, &target, &relation.as_str()],
            )?;
            Ok(edges.into_iter().next())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete edges between two memories. With `relation = None` every parallel
/// type goes. Returns the number removed.
pub async fn delete_edge(
    db: &Database,
    source: Uuid,
    target: Uuid,
    relation: Option<RelationType>,
) -> Result<usize, MemoriaError> {
    let source = source.to_string();
    let target = target.to_string();
    db.connection()
        .call(move |conn| {
            let removed = match relation {
                Some(rt) => conn.execute(
                    "DELETE FROM memory_relations
                     WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3",
                    params![source, target, rt.as_str()],
                )?,
                None => conn.execute(
                    "DELETE FROM memory_relations WHERE source_id = ?1 AND target_id = ?2",
                    params![source, target],
                )?,
            };
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every edge incident to a memory. Called when the memory is
/// deleted or merged away.
pub async fn delete_for_memory(db: &Database, memory_id: Uuid) -> Result<usize, MemoriaError> {
    let id = memory_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM memory_relations WHERE source_id = ?1 OR target_id = ?1",
                params![id],
            )?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}

/// Edges incident to a memory, in insertion order. `relation = None`
/// returns all types.
pub async fn list_edges(
    db: &Database,
    memory_id: Uuid,
    direction: Direction,
    relation: Option<RelationType>,
) -> Result<Vec<Edge>, MemoriaError> {
    let id = memory_id.to_string();
    db.connection()
        .call(move |conn| {
            let clause = match direction {
                Direction::Outgoing => "source_id = ?1",
                Direction::Incoming => "target_id = ?1",
                Direction::Both => "(source_id = ?1 OR target_id = ?1)",
            };
            let edges = match relation {
                Some(rt) => {
                    let sql = format!(
                        "SELECT {EDGE_COLUMNS} FROM memory_relations
                         WHERE {clause} AND relation_type = ?2 ORDER BY id ASC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    collect_edges(&mut stmt, &[&id, &rt.as_str()])?
                }
                None => {
                    let sql = format!(
                        "SELECT {EDGE_COLUMNS} FROM memory_relations
                         WHERE {clause} ORDER BY id ASC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    collect_edges(&mut stmt, &[&id])?
                }
            };
            Ok(edges)
        })
        .await
        .map_err(map_tr_err)
}

/// Every edge in the store, in insertion order. Used by export and the
/// reconciliation scan.
pub async fn all_edges(db: &Database) -> Result<Vec<Edge>, MemoriaError> {
    db.connection()
        .call(move |conn| {
            let sql =
                format!("SELECT {EDGE_COLUMNS} FROM memory_relations ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let edges = collect_edges(&mut stmt, &[])?;
            Ok(edges)
        })
        .await
        .map_err(map_tr_err)
}

/// Update the weight and creator of an existing edge, used when merged
/// edges collide.
pub async fn update_edge_weight(
    db: &Database,
    source: Uuid,
    target: Uuid,
    relation: RelationType,
    weight: f64,
    creator: RelationCreator,
) -> Result<(), MemoriaError> {
    let source = source.to_string();
    let target = target.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE memory_relations SET weight = ?4, created_by = ?5
                 WHERE source_id = ?1 AND target_id = ?2 AND relation_type = ?3",
                params![source, target, relation.as_str(), weight, creator.as_str()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Distinct memory ids that have at least one outgoing edge.
pub async fn memories_with_outgoing(db: &Database) -> Result<Vec<Uuid>, MemoriaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT source_id FROM memory_relations")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let parsed = ids
                .iter()
                .map(|s| {
                    Uuid::parse_str(s).map_err(|e| {
                        MemoriaError::Internal(format!("malformed uuid {s:?}: {e}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(other_err)?;
            Ok(parsed)
        })
        .await
        .map_err(map_tr_err)
}

/// Per-type incoming/outgoing counts for one memory.
pub async fn count_relations(
    db: &Database,
    memory_id: Uuid,
) -> Result<RelationCounts, MemoriaError> {
    let id = memory_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT relation_type,
                        SUM(CASE WHEN source_id = ?1 THEN 1 ELSE 0 END),
                        SUM(CASE WHEN target_id = ?1 THEN 1 ELSE 0 END)
                 FROM memory_relations
                 WHERE source_id = ?1 OR target_id = ?1
                 GROUP BY relation_type",
            )?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)? as usize,
                        row.get::<_, i64>(2)? as usize,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let by_type = rows
                .into_iter()
                .map(|(name, out, inc)| RelationType::parse(&name).map(|rt| (rt, out, inc)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(other_err)?;
            Ok(RelationCounts { by_type })
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memoria_core::types::Metadata;

    pub(crate) fn edge(source: Uuid, target: Uuid, relation: RelationType) -> Edge {
        Edge {
            source_id: source,
            target_id: target,
            relation,
            weight: 1.0,
            creator: RelationCreator::User,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Fixes)).await.unwrap();

        let fetched = get_edge(&db, a, b, RelationType::Fixes).await.unwrap().unwrap();
        assert_eq!(fetched.source_id, a);
        assert_eq!(fetched.target_id, b);
        assert_eq!(fetched.relation, RelationType::Fixes);
        assert_eq!(fetched.creator, RelationCreator::User);

        assert!(get_edge(&db, a, b, RelationType::Causes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_triple_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();

        let err = insert_edge(&db, &edge(a, b, RelationType::Related))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoriaError::DuplicateEdge { .. }));

        // A different type between the same pair is fine.
        insert_edge(&db, &edge(a, b, RelationType::Supports)).await.unwrap();
    }

    #[tokio::test]
    async fn self_loop_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let a = Uuid::new_v4();
        let err = insert_edge(&db, &edge(a, a, RelationType::Related))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoriaError::SelfLoop(_)));
    }

    #[tokio::test]
    async fn bulk_insert_counts_outcomes() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![
            edge(a, b, RelationType::Related),
            edge(a, b, RelationType::Related), // duplicate
            edge(b, c, RelationType::Follows),
            edge(c, c, RelationType::Related), // self-loop -> error
        ];
        let report = bulk_insert_edges(&db, &edges).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn list_edges_filters_by_direction_and_type() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Fixes)).await.unwrap();
        insert_edge(&db, &edge(c, a, RelationType::Supports)).await.unwrap();

        let outgoing = list_edges(&db, a, Direction::Outgoing, None).await.unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target_id, b);

        let incoming = list_edges(&db, a, Direction::Incoming, None).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_id, c);

        let both = list_edges(&db, a, Direction::Both, None).await.unwrap();
        assert_eq!(both.len(), 2);

        let fixes = list_edges(&db, a, Direction::Both, Some(RelationType::Fixes))
            .await
            .unwrap();
        assert_eq!(fixes.len(), 1);
    }

    #[tokio::test]
    async fn delete_edge_with_and_without_type() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Fixes)).await.unwrap();
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();

        let removed = delete_edge(&db, a, b, Some(RelationType::Fixes)).await.unwrap();
        assert_eq!(removed, 1);

        insert_edge(&db, &edge(a, b, RelationType::Supports)).await.unwrap();
        // Omitting the type deletes all parallel edges.
        let removed = delete_edge(&db, a, b, None).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn delete_for_memory_cascades_both_directions() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(c, a, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(b, c, RelationType::Related)).await.unwrap();

        let removed = delete_for_memory(&db, a).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(all_edges(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn count_relations_by_type() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Fixes)).await.unwrap();
        insert_edge(&db, &edge(c, a, RelationType::Fixes)).await.unwrap();
        insert_edge(&db, &edge(a, c, RelationType::Related)).await.unwrap();

        let counts = count_relations(&db, a).await.unwrap();
        assert_eq!(counts.total(), 3);
        let fixes = counts
            .by_type
            .iter()
            .find(|(rt, _, _)| *rt == RelationType::Fixes)
            .unwrap();
        assert_eq!((fixes.1, fixes.2), (1, 1));
    }

    #[tokio::test]
    async fn memories_with_outgoing_lists_sources() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();

        let sources = memories_with_outgoing(&db).await.unwrap();
        assert_eq!(sources, vec![a]);
    }

    #[tokio::test]
    async fn update_edge_weight_and_creator() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();

        update_edge_weight(&db, a, b, RelationType::Related, 0.4, RelationCreator::Auto)
            .await
            .unwrap();
        let fetched = get_edge(&db, a, b, RelationType::Related).await.unwrap().unwrap();
        assert!((fetched.weight - 0.4).abs() < 1e-9);
        assert_eq!(fetched.creator, RelationCreator::Auto);
    }
}
