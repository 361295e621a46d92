//! Shortest path between two endpoints.

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MineError;
use crate::graph::index::KnowledgeGraph;
use crate::graph::traverse::{shortest_path, TraversalMode};
use crate::subgraph::{Origin, PathKind, Subgraph};

use super::{assemble, check_max_nodes, Method, MineResult, MinerConfig};

/// Connect `start` and `end` by a shortest path of at most `max_nodes` nodes.
///
/// Missing endpoints are drawn uniformly from the graph (the end always
/// differs from the start). The search follows edge direction first; if that
/// finds nothing within the bound, it retries ignoring direction and marks
/// the result [`PathKind::Undirected`]. Equally short paths are ranked by
/// their node-label sequence and the smallest wins.
pub fn extract_two_nodes(
    graph: &KnowledgeGraph,
    start: Option<&str>,
    end: Option<&str>,
    max_nodes: usize,
    rng_seed: u64,
) -> MineResult<Subgraph> {
    two_nodes(
        graph,
        start,
        end,
        max_nodes,
        &MinerConfig::default(),
        rng_seed,
    )
}

pub(crate) fn two_nodes(
    graph: &KnowledgeGraph,
    start: Option<&str>,
    end: Option<&str>,
    max_nodes: usize,
    config: &MinerConfig,
    rng_seed: u64,
) -> MineResult<Subgraph> {
    check_max_nodes(max_nodes)?;
    if graph.is_empty() {
        return Err(MineError::EmptyGraph);
    }

    let lookup = |label: &str| {
        graph
            .index_of(label)
            .ok_or_else(|| MineError::DisconnectedSeed {
                label: label.to_owned(),
            })
    };
    let fixed_start = start.map(lookup).transpose()?;
    let fixed_end = end.map(lookup).transpose()?;

    let mut rng = StdRng::seed_from_u64(rng_seed);
    let start = match fixed_start {
        Some(s) => s,
        None => sample_other(graph, fixed_end, &mut rng)?,
    };
    let end = match fixed_end {
        Some(e) => e,
        None => sample_other(graph, Some(start), &mut rng)?,
    };
    if start == end {
        let label = graph.graph()[start].label.clone();
        return Err(MineError::DegenerateEndpoints {
            start: label.clone(),
            end: label,
        });
    }

    let max_hops = max_nodes - 1;
    let directed = shortest_path(graph, start, end, TraversalMode::Directed, max_hops);
    let (path, path_kind) = match directed {
        Some(p) => (p, PathKind::Directed),
        None => match shortest_path(graph, start, end, TraversalMode::Undirected, max_hops) {
            Some(p) => (p, PathKind::Undirected),
            None => {
                return Err(MineError::NoPathWithinBound {
                    start: graph.graph()[start].label.clone(),
                    end: graph.graph()[end].label.clone(),
                    max_nodes,
                });
            }
        },
    };

    let path_edges = path
        .windows(2)
        .map(|pair| connecting_edge(graph, pair[0], pair[1], path_kind))
        .collect::<Option<Vec<EdgeIndex>>>()
        .ok_or_else(|| MineError::NoPathWithinBound {
            start: graph.graph()[start].label.clone(),
            end: graph.graph()[end].label.clone(),
            max_nodes,
        })?;

    let origin = Origin {
        method: Method::TwoNodes,
        path_kind,
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

/// A node drawn uniformly from the graph, never `exclude`.
fn sample_other(
    graph: &KnowledgeGraph,
    exclude: Option<NodeIndex>,
    rng: &mut StdRng,
) -> MineResult<NodeIndex> {
    let pool: Vec<NodeIndex> = graph
        .graph()
        .node_indices()
        .filter(|&n| Some(n) != exclude)
        .collect();
    if pool.is_empty() {
        let label = exclude
            .map(|n| graph.graph()[n].label.clone())
            .unwrap_or_default();
        return Err(MineError::DegenerateEndpoints {
            start: label.clone(),
            end: label,
        });
    }
    Ok(pool[rng.gen_range(0..pool.len())])
}

/// The earliest-created edge joining `a` to `b` (either way if undirected).
fn connecting_edge(
    graph: &KnowledgeGraph,
    a: NodeIndex,
    b: NodeIndex,
    kind: PathKind,
) -> Option<EdgeIndex> {
    let g = graph.graph();
    let forward = g.edges_connecting(a, b).map(|e| e.id());
    match kind {
        PathKind::Directed => forward.min(),
        PathKind::Undirected => forward.chain(g.edges_connecting(b, a).map(|e| e.id())).min(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mine::tests::link;
    use crate::subgraph::SubgraphEdge;

    fn label_path(sg: &Subgraph) -> Vec<&str> {
        sg.path_nodes().iter().map(String::as_str).collect()
    }

    #[test]
    fn directed_path_between_endpoints() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "causes", "B");
        link(&mut kg, "B", "causes", "C");
        link(&mut kg, "A", "unrelated", "D");
        let sg = extract_two_nodes(&kg, Some("A"), Some("C"), 5, 0).unwrap();
        assert_eq!(label_path(&sg), vec!["A", "B", "C"]);
        assert_eq!(sg.origin().path_kind, PathKind::Directed);
        assert_eq!(sg.start_node(), "A");
        assert_eq!(sg.end_node(), "C");
        for (pair, edge) in sg.path_nodes().windows(2).zip(sg.path_edges()) {
            assert_eq!(edge.source, pair[0]);
            assert_eq!(edge.target, pair[1]);
        }
        assert_eq!(sg.auxiliary_nodes(), ["D"]);
    }

    #[test]
    fn adjacent_endpoints_are_valid() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "r", "B");
        let sg = extract_two_nodes(&kg, Some("A"), Some("B"), 2, 0).unwrap();
        assert_eq!(label_path(&sg), vec!["A", "B"]);
        assert_eq!(sg.path_edges().len(), 1);
    }

    #[test]
    fn earliest_edge_is_path_edge() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "second", "B");
        link(&mut kg, "A", "first", "B");
        let sg = extract_two_nodes(&kg, Some("A"), Some("B"), 3, 0).unwrap();
        assert_eq!(sg.path_edges()[0].relation, "second");
        assert_eq!(sg.auxiliary_edges(), [SubgraphEdge::new("A", "first", "B")]);
    }

    #[test]
    fn lexicographic_tie_break() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "S", "r", "Z");
        link(&mut kg, "Z", "r", "T");
        link(&mut kg, "S", "r", "M");
        link(&mut kg, "M", "r", "T");
        let sg = extract_two_nodes(&kg, Some("S"), Some("T"), 5, 0).unwrap();
        assert_eq!(label_path(&sg), vec!["S", "M", "T"]);
        assert!(sg.auxiliary_nodes().contains(&"Z".to_string()));
    }

    #[test]
    fn falls_back_to_undirected() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "r", "B");
        link(&mut kg, "C", "r", "B");
        let sg = extract_two_nodes(&kg, Some("A"), Some("C"), 5, 0).unwrap();
        assert_eq!(label_path(&sg), vec!["A", "B", "C"]);
        assert_eq!(sg.origin().path_kind, PathKind::Undirected);
        assert_eq!(sg.path_edges()[1], SubgraphEdge::new("C", "r", "B"));
    }

    #[test]
    fn bound_limits_path_length() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "r", "B");
        link(&mut kg, "B", "r", "C");
        link(&mut kg, "C", "r", "D");
        assert!(matches!(
            extract_two_nodes(&kg, Some("A"), Some("D"), 3, 0),
            Err(MineError::NoPathWithinBound { max_nodes: 3, .. })
        ));
        assert_eq!(
            extract_two_nodes(&kg, Some("A"), Some("D"), 4, 0)
                .unwrap()
                .path_nodes()
                .len(),
            4
        );
    }

    #[test]
    fn disconnected_components_have_no_path() {
        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "r", "B");
        link(&mut kg, "X", "r", "Y");
        assert!(matches!(
            extract_two_nodes(&kg, Some("A"), Some("Y"), 10, 0),
            Err(MineError::NoPathWithinBound { .. })
        ));
    }

    #[test]
    fn endpoint_errors() {
        let empty = KnowledgeGraph::new();
        assert!(matches!(
            extract_two_nodes(&empty, None, None, 5, 0),
            Err(MineError::EmptyGraph)
        ));

        let mut kg = KnowledgeGraph::new();
        link(&mut kg, "A", "r", "B");
        assert!(matches!(
            extract_two_nodes(&kg, Some("A"), Some("missing"), 5, 0),
            Err(MineError::DisconnectedSeed { .. })
        ));
        assert!(matches!(
            extract_two_nodes(&kg, Some("A"), Some("A"), 5, 0),
            Err(MineError::DegenerateEndpoints { .. })
        ));

        let mut lone = KnowledgeGraph::new();
        lone.ensure_node("solo");
        assert!(matches!(
            extract_two_nodes(&lone, None, None, 5, 0),
            Err(MineError::DegenerateEndpoints { .. })
        ));
    }

    #[test]
    fn sampled_endpoints_are_distinct_and_reproducible() {
        let mut kg = KnowledgeGraph::new();
        for (a, b) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")] {
            link(&mut kg, a, "r", b);
        }
        for seed in 0..30 {
            let first = extract_two_nodes(&kg, None, None, 5, seed).unwrap();
            let again = extract_two_nodes(&kg, None, None, 5, seed).unwrap();
            assert_ne!(first.start_node(), first.end_node());
            assert_eq!(first, again);
        }
        let sg = extract_two_nodes(&kg, None, Some("C"), 5, 3).unwrap();
        assert_eq!(sg.end_node(), "C");
        assert_ne!(sg.start_node(), "C");
    }
}
