//! Seeded random walk along outgoing edges.

use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MineError;
use crate::graph::index::KnowledgeGraph;
use crate::graph::Direction;
use crate::subgraph::{Origin, PathKind, Subgraph};

use super::{assemble, check_max_nodes, Method, MineResult, MinerConfig};

/// Walk from `seed` (or a random node with an outgoing edge).
///
/// Each step picks uniformly among outgoing edges, in creation order, whose
/// target is not yet on the walk. Stops after `max_steps` advances, at
/// `max_nodes` distinct nodes, or when no such edge exists, so the path has
/// at most `max_steps + 1` nodes and never revisits one.
pub fn extract_random_walk(
    graph: &KnowledgeGraph,
    seed: Option<&str>,
    max_steps: usize,
    max_nodes: usize,
    rng_seed: u64,
) -> MineResult<Subgraph> {
    random_walk(
        graph,
        seed,
        max_steps,
        max_nodes,
        &MinerConfig::default(),
        rng_seed,
    )
}

pub(crate) fn random_walk(
    graph: &KnowledgeGraph,
    seed: Option<&str>,
    max_steps: usize,
    max_nodes: usize,
    config: &MinerConfig,
    rng_seed: u64,
) -> MineResult<Subgraph> {
    if max_steps == 0 {
        return Err(MineError::InvalidBounds {
            message: "max_steps must be at least 1".into(),
        });
    }
    check_max_nodes(max_nodes)?;
    if graph.is_empty() {
        return Err(MineError::EmptyGraph);
    }

    let mut rng = StdRng::seed_from_u64(rng_seed);
    let start = match seed {
        Some(label) => graph
            .index_of(label)
            .ok_or_else(|| MineError::DisconnectedSeed {
                label: label.to_owned(),
            })?,
        None => {
            let walkable: Vec<NodeIndex> = graph
                .graph()
                .node_indices()
                .filter(|&n| can_leave(graph, n))
                .collect();
            if walkable.is_empty() {
                return Err(MineError::NoWalkableNode);
            }
            walkable[rng.gen_range(0..walkable.len())]
        }
    };

    let mut path = vec![start];
    let mut path_edges: Vec<EdgeIndex> = Vec::new();
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut current = start;

    while path_edges.len() < max_steps && path.len() < max_nodes {
        let options: Vec<(EdgeIndex, NodeIndex)> = graph
            .incident_edge_indices(current, Direction::Outgoing)
            .into_iter()
            .filter_map(|e| graph.graph().edge_endpoints(e).map(|(_, t)| (e, t)))
            .filter(|(_, t)| !visited.contains(t))
            .collect();
        if options.is_empty() {
            break;
        }
        let (edge, next) = options[rng.gen_range(0..options.len())];
        path.push(next);
        path_edges.push(edge);
        visited.insert(next);
        current = next;
    }

    if path_edges.is_empty() {
        return Err(MineError::DeadEnd {
            label: graph.graph()[start].label.clone(),
        });
    }

    let origin = Origin {
        method: Method::RandomWalk,
        path_kind: PathKind::Directed,
    };
    Ok(assemble(
        graph,
        &path,
        &path_edges,
        origin,
        config,
        &mut rng,
        rng_seed,
    ))
}

/// Whether `n` has an outgoing edge to another node.
fn can_leave(graph: &KnowledgeGraph, n: NodeIndex) -> bool {
    graph
        .graph()
        .neighbors_directed(n, petgraph::Direction::Outgoing)
        .any(|t| t != n)
}
