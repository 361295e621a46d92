//! Breadth-first traversal over the knowledge graph.
//!
//! Provides hop-bounded BFS distance maps and label-ordered shortest paths,
//! in either the directed sense or ignoring edge direction.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::NodeIndex;

use super::index::KnowledgeGraph;

/// Whether traversal follows edge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    Directed,
    Undirected,
}

/// Neighbors of `idx` in traversal order.
///
/// `reverse` follows edges backwards (only meaningful when directed).
fn neighbors(
    kg: &KnowledgeGraph,
    idx: NodeIndex,
    mode: TraversalMode,
    reverse: bool,
) -> impl Iterator<Item = NodeIndex> + '_ {
    let graph = kg.graph();
    let (forward, backward) = match (mode, reverse) {
        (TraversalMode::Undirected, _) => (true, true),
        (TraversalMode::Directed, false) => (true, false),
        (TraversalMode::Directed, true) => (false, true),
    };
    let out = forward
        .then(|| graph.neighbors_directed(idx, petgraph::Direction::Outgoing))
        .into_iter()
        .flatten();
    let inc = backward
        .then(|| graph.neighbors_directed(idx, petgraph::Direction::Incoming))
        .into_iter()
        .flatten();
    out.chain(inc)
}

/// Hop distance from every node that can reach `target` within `max_hops`.
///
/// In directed mode the search runs over reversed edges, so the map answers
/// "how many forward hops from here to `target`".
pub fn distances_to(
    kg: &KnowledgeGraph,
    target: NodeIndex,
    mode: TraversalMode,
    max_hops: usize,
) -> HashMap<NodeIndex, usize> {
    let mut dist: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();
    dist.insert(target, 0);
    queue.push_back(target);

    while let Some(node) = queue.pop_front() {
        let d = dist[&node];
        if d >= max_hops {
            continue;
        }
        for next in neighbors(kg, node, mode, true) {
            if !dist.contains_key(&next) {
                dist.insert(next, d + 1);
                queue.push_back(next);
            }
        }
    }
    dist
}

/// Shortest path from `start` to `end` with at most `max_hops` edges.
///
/// Among equally short paths, returns the one whose node-label sequence is
/// lexicographically smallest: each step takes the smallest-label neighbor
/// that is one hop closer to `end`.
pub fn shortest_path(
    kg: &KnowledgeGraph,
    start: NodeIndex,
    end: NodeIndex,
    mode: TraversalMode,
    max_hops: usize,
) -> Option<Vec<NodeIndex>> {
    let dist = distances_to(kg, end, mode, max_hops);
    let mut remaining = *dist.get(&start)?;
    let graph = kg.graph();

    let mut path = vec![start];
    let mut current = start;
    while remaining > 0 {
        let next = neighbors(kg, current, mode, false)
            .filter(|n| dist.get(n) == Some(&(remaining - 1)))
            .min_by(|a, b| graph[*a].label.cmp(&graph[*b].label))?;
        path.push(next);
        current = next;
        remaining -= 1;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SourceRef;

    fn link(kg: &mut KnowledgeGraph, a: &str, b: &str) {
        kg.ensure_node(a);
        kg.ensure_node(b);
        let source = SourceRef {
            relation: "r".into(),
            triplet_id: format!("{a}->{b}"),
            metadata: None,
        };
        kg.upsert_edge(a, b, "r", source).unwrap();
    }

    fn labels(kg: &KnowledgeGraph, path: &[NodeIndex]) -> Vec<String> {
        path.iter().map(|&i| kg.graph()[i].label.clone()).collect()
    }

    fn build_chain_graph() -> KnowledgeGraph {
        // A --> B --> C --> D
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "B");
        link(&mut kg, "B", "C");
        link(&mut kg, "C", "D");
        kg
    }

    fn idx(kg: &KnowledgeGraph, label: &str) -> NodeIndex {
        kg.index_of(label).unwrap()
    }

    #[test]
    fn distances_along_chain() {
        let kg = build_chain_graph();
        let dist = distances_to(&kg, idx(&kg, "D"), TraversalMode::Directed, 10);
        assert_eq!(dist[&idx(&kg, "A")], 3);
        assert_eq!(dist[&idx(&kg, "C")], 1);
    }

    #[test]
    fn distances_respect_hop_limit() {
        let kg = build_chain_graph();
        let dist = distances_to(&kg, idx(&kg, "D"), TraversalMode::Directed, 2);
        assert!(dist.contains_key(&idx(&kg, "B")));
        assert!(!dist.contains_key(&idx(&kg, "A")));
    }

    #[test]
    fn directed_path_follows_edges() {
        let kg = build_chain_graph();
        let path = shortest_path(
            &kg,
            idx(&kg, "A"),
            idx(&kg, "D"),
            TraversalMode::Directed,
            5,
        )
        .unwrap();
        assert_eq!(labels(&kg, &path), vec!["A", "B", "C", "D"]);
        assert!(
            shortest_path(&kg, idx(&kg, "D"), idx(&kg, "A"), TraversalMode::Directed, 5).is_none()
        );
    }

    #[test]
    fn undirected_path_ignores_direction() {
        let kg = build_chain_graph();
        let path = shortest_path(
            &kg,
            idx(&kg, "D"),
            idx(&kg, "A"),
            TraversalMode::Undirected,
            5,
        )
        .unwrap();
        assert_eq!(labels(&kg, &path), vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn ties_pick_smallest_label_sequence() {
        // S -> Y -> T and S -> X -> T, Y inserted first.
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "S", "Y");
        link(&mut kg, "Y", "T");
        link(&mut kg, "S", "X");
        link(&mut kg, "X", "T");
        let path = shortest_path(
            &kg,
            idx(&kg, "S"),
            idx(&kg, "T"),
            TraversalMode::Directed,
            4,
        )
        .unwrap();
        assert_eq!(labels(&kg, &path), vec!["S", "X", "T"]);
    }

    #[test]
    fn hop_limit_blocks_long_path() {
        let kg = build_chain_graph();
        assert!(
            shortest_path(&kg, idx(&kg, "A"), idx(&kg, "D"), TraversalMode::Directed, 2).is_none()
        );
    }
}
