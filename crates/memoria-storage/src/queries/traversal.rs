// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Breadth-first graph traversal: neighbors, shortest path, subgraph.
//!
//! Traversal runs in Rust over indexed edge queries. Every walk carries a
//! visited set and is capped by depth, so cycles cannot cause
//! non-termination. Edges are iterated in insertion order, which makes
//! shortest-path tie-breaks deterministic.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use memoria_core::types::{Direction, Edge, RelationType};
use memoria_core::MemoriaError;

use crate::database::Database;
use crate::models::{Neighbor, PathStep, StepDirection, Subgraph, SubgraphEdge};
use crate::queries::relations::list_edges;

/// The far endpoint of `edge` relative to `node`, with the hop direction.
fn other_endpoint(edge: &Edge, node: Uuid) -> (Uuid, StepDirection) {
    if edge.source_id == node {
        (edge.target_id, StepDirection::Forward)
    } else {
        (edge.source_id, StepDirection::Backward)
    }
}

fn type_allowed(relation: RelationType, allowed: Option<&[RelationType]>) -> bool {
    allowed.is_none_or(|types| types.contains(&relation))
}

/// Memories reachable within `depth` hops, deduplicated by target id
/// keeping the minimum depth. BFS order guarantees the first visit is the
/// shallowest.
pub async fn neighbors(
    db: &Database,
    memory_id: Uuid,
    depth: usize,
    allowed_types: Option<&[RelationType]>,
    direction: Direction,
) -> Result<Vec<Neighbor>, MemoriaError> {
    let mut results = Vec::new();
    if depth == 0 {
        return Ok(results);
    }

    let mut visited: HashSet<Uuid> = HashSet::from([memory_id]);
    let mut frontier: Vec<(Uuid, Vec<Uuid>)> = vec![(memory_id, vec![memory_id])];

    for hop in 1..=depth {
        let mut next = Vec::new();
        for (node, path) in &frontier {
            let edges = list_edges(db, *node, direction, None).await?;
            for edge in edges {
                if !type_allowed(edge.relation, allowed_types) {
                    continue;
                }
                let (neighbor, _) = other_endpoint(&edge, *node);
                if neighbor == *node || !visited.insert(neighbor) {
                    continue;
                }
                let mut neighbor_path = path.clone();
                neighbor_path.push(neighbor);
                results.push(Neighbor {
                    memory_id: neighbor,
                    depth: hop,
                    path: neighbor_path.clone(),
                    relation: edge.relation,
                    weight: edge.weight,
                });
                next.push((neighbor, neighbor_path));
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    Ok(results)
}

/// Shortest path between two memories, following edges in either
/// direction, or an empty vec if none exists within `max_depth` hops.
/// Ties break by edge insertion order.
pub async fn shortest_path(
    db: &Database,
    from: Uuid,
    to: Uuid,
    max_depth: usize,
) -> Result<Vec<PathStep>, MemoriaError> {
    if from == to {
        return Ok(vec![PathStep {
            memory_id: from,
            relation: None,
            direction: None,
        }]);
    }
    if max_depth == 0 {
        return Ok(vec![]);
    }

    // parent[n] = (previous node, relation on the hop, hop direction)
    let mut parent: HashMap<Uuid, (Uuid, RelationType, StepDirection)> = HashMap::new();
    let mut visited: HashSet<Uuid> = HashSet::from([from]);
    let mut queue: VecDeque<(Uuid, usize)> = VecDeque::from([(from, 0)]);

    'search: while let Some((node, dist)) = queue.pop_front() {
        if dist == max_depth {
            continue;
        }
        let edges = list_edges(db, node, Direction::Both, None).await?;
        for edge in edges {
            let (neighbor, hop_direction) = other_endpoint(&edge, node);
            if !visited.insert(neighbor) {
                continue;
            }
            parent.insert(neighbor, (node, edge.relation, hop_direction));
            if neighbor == to {
                break 'search;
            }
            queue.push_back((neighbor, dist + 1));
        }
    }

    if !parent.contains_key(&to) {
        return Ok(vec![]);
    }

    // Walk back from the target, then reverse into from→to order.
    let mut steps = Vec::new();
    let mut cursor = to;
    while cursor != from {
        let (prev, relation, direction) = parent[&cursor];
        steps.push(PathStep {
            memory_id: cursor,
            relation: Some(relation),
            direction: Some(direction),
        });
        cursor = prev;
    }
    steps.push(PathStep {
        memory_id: from,
        relation: None,
        direction: None,
    });
    steps.reverse();
    Ok(steps)
}

/// The subgraph within `depth` hops of `center`: all reached nodes plus
/// every edge between them, each annotated with the shallowest traversal
/// depth at which it appears (1 + the minimum endpoint depth).
pub async fn subgraph(
    db: &Database,
    center: Uuid,
    depth: usize,
) -> Result<Subgraph, MemoriaError> {
    let reached = neighbors(db, center, depth, None, Direction::Both).await?;

    let mut node_depth: HashMap<Uuid, usize> = HashMap::from([(center, 0)]);
    for neighbor in &reached {
        node_depth.entry(neighbor.memory_id).or_insert(neighbor.depth);
    }

    let mut edges = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid, RelationType)> = HashSet::new();
    for &node in node_depth.keys() {
        for edge in list_edges(db, node, Direction::Outgoing, None).await? {
            if !node_depth.contains_key(&edge.target_id) {
                continue;
            }
            if !seen.insert((edge.source_id, edge.target_id, edge.relation)) {
                continue;
            }
            let edge_depth =
                1 + node_depth[&edge.source_id].min(node_depth[&edge.target_id]);
            edges.push(SubgraphEdge {
                edge,
                depth: edge_depth,
            });
        }
    }

    let mut nodes: Vec<Uuid> = node_depth.keys().copied().collect();
    nodes.sort();
    Ok(Subgraph {
        center,
        depth,
        nodes,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memoria_core::types::{Metadata, RelationCreator};

    use crate::queries::relations::insert_edge;

    fn edge(source: Uuid, target: Uuid, relation: RelationType) -> Edge {
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

    async fn chain() -> (Database, [Uuid; 4]) {
        // a -> b -> c -> d
        let db = Database::open_in_memory().await.unwrap();
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        for window in ids.windows(2) {
            insert_edge(&db, &edge(window[0], window[1], RelationType::Follows))
                .await
                .unwrap();
        }
        (db, ids)
    }

    #[tokio::test]
    async fn neighbors_respect_depth() {
        let (db, [a, b, c, d]) = chain().await;

        let one_hop = neighbors(&db, a, 1, None, Direction::Both).await.unwrap();
        assert_eq!(one_hop.len(), 1);
        assert_eq!(one_hop[0].memory_id, b);
        assert_eq!(one_hop[0].depth, 1);

        let two_hops = neighbors(&db, a, 2, None, Direction::Both).await.unwrap();
        let ids: Vec<Uuid> = two_hops.iter().map(|n| n.memory_id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(two_hops[1].depth, 2);
        assert_eq!(two_hops[1].path, vec![a, b, c]);
        assert!(!ids.contains(&d));
    }

    #[tokio::test]
    async fn neighbors_follow_direction() {
        let (db, [a, b, _, _]) = chain().await;

        let outgoing = neighbors(&db, b, 1, None, Direction::Outgoing).await.unwrap();
        assert_eq!(outgoing.len(), 1);

        let incoming = neighbors(&db, b, 1, None, Direction::Incoming).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].memory_id, a);

        let both = neighbors(&db, b, 1, None, Direction::Both).await.unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn neighbors_filter_by_type() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Fixes)).await.unwrap();
        insert_edge(&db, &edge(a, c, RelationType::Related)).await.unwrap();

        let only_fixes = neighbors(&db, a, 1, Some(&[RelationType::Fixes]), Direction::Both)
            .await
            .unwrap();
        assert_eq!(only_fixes.len(), 1);
        assert_eq!(only_fixes[0].memory_id, b);
    }

    #[tokio::test]
    async fn traversal_terminates_on_cycles() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(b, c, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(c, a, RelationType::Related)).await.unwrap();

        let reached = neighbors(&db, a, 10, None, Direction::Both).await.unwrap();
        let ids: HashSet<Uuid> = reached.iter().map(|n| n.memory_id).collect();
        assert_eq!(ids, HashSet::from([b, c]));
        // Each node appears once, at its minimum depth.
        assert_eq!(reached.len(), 2);
        assert!(reached.iter().all(|n| n.depth == 1));
    }

    #[tokio::test]
    async fn shortest_path_walks_the_chain() {
        let (db, [a, b, c, d]) = chain().await;

        let path = shortest_path(&db, a, d, 5).await.unwrap();
        let ids: Vec<Uuid> = path.iter().map(|s| s.memory_id).collect();
        assert_eq!(ids, vec![a, b, c, d]);
        assert!(path[0].relation.is_none());
        assert_eq!(path[1].relation, Some(RelationType::Follows));
        assert_eq!(path[1].direction, Some(StepDirection::Forward));
    }

    #[tokio::test]
    async fn shortest_path_reports_backward_hops() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(b, a, RelationType::Fixes)).await.unwrap();

        let path = shortest_path(&db, a, b, 3).await.unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].direction, Some(StepDirection::Backward));
    }

    #[tokio::test]
    async fn shortest_path_respects_max_depth() {
        let (db, [a, _, _, d]) = chain().await;
        assert!(shortest_path(&db, a, d, 2).await.unwrap().is_empty());
        assert_eq!(shortest_path(&db, a, d, 3).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn shortest_path_prefers_fewer_hops() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // Long way round first, then a direct edge.
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(b, c, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(a, c, RelationType::Related)).await.unwrap();

        let path = shortest_path(&db, a, c, 5).await.unwrap();
        assert_eq!(path.len(), 2, "direct edge must win over the two-hop path");
    }

    #[tokio::test]
    async fn shortest_path_to_self_is_a_single_step() {
        let db = Database::open_in_memory().await.unwrap();
        let a = Uuid::new_v4();
        let path = shortest_path(&db, a, a, 5).await.unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].memory_id, a);
    }

    #[tokio::test]
    async fn shortest_path_missing_returns_empty() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(shortest_path(&db, a, b, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subgraph_collects_internal_edges() {
        let db = Database::open_in_memory().await.unwrap();
        let (a, b, c, outside) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        insert_edge(&db, &edge(a, b, RelationType::Related)).await.unwrap();
        insert_edge(&db, &edge(b, c, RelationType::Related)).await.unwrap();
        // Edge leaving the 1-hop ball around `a` via c -> outside.
        insert_edge(&db, &edge(c, outside, RelationType::Related)).await.unwrap();

        let graph = subgraph(&db, a, 2).await.unwrap();
        assert!(graph.nodes.contains(&a));
        assert!(graph.nodes.contains(&b));
        assert!(graph.nodes.contains(&c));
        assert!(!graph.nodes.contains(&outside));
        assert_eq!(graph.edges.len(), 2);

        let ab = graph
            .edges
            .iter()
            .find(|e| e.edge.source_id == a)
            .unwrap();
        assert_eq!(ab.depth, 1);
        let bc = graph
            .edges
            .iter()
            .find(|e| e.edge.source_id == b)
            .unwrap();
        assert_eq!(bc.depth, 2);
    }
}
