//! Subgraph mining: bounded, path-shaped extracts of the knowledge graph.
//!
//! Two strategies share one output contract:
//!
//! - [`walk`]: a seeded random walk along outgoing edges
//! - [`path`]: the shortest path between two endpoints, directed first with
//!   an undirected fallback
//!
//! Both surround the primary path with its one-hop neighborhood (auxiliary
//! nodes and edges). Mining only reads the graph; the same inputs and
//! `rng_seed` always give the same [`Subgraph`].

pub mod path;
pub mod walk;

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use petgraph::graph::{EdgeIndex, NodeIndex};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MineError};
use crate::graph::index::KnowledgeGraph;
use crate::graph::Direction;
use crate::subgraph::{GraphStats, Origin, Subgraph, SubgraphEdge};

pub use path::extract_two_nodes;
pub use walk::extract_random_walk;

/// Result type for mining operations.
pub type MineResult<T> = std::result::Result<T, MineError>;

/// Traversal strategy tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    #[default]
    RandomWalk,
    TwoNodes,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RandomWalk => write!(f, "random_walk"),
            Self::TwoNodes => write!(f, "two_nodes"),
        }
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_walk" => Ok(Self::RandomWalk),
            "two_nodes" => Ok(Self::TwoNodes),
            other => Err(ConfigError::Invalid {
                message: format!("unknown method \"{other}\" (expected random_walk or two_nodes)"),
            }),
        }
    }
}

/// Miner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    #[serde(default)]
    pub method: Method,
    /// Upper bound on path nodes.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Upper bound on random-walk advances.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
    /// Chance that each auxiliary node is kept.
    #[serde(default = "default_neighbor_probability")]
    pub neighbor_probability: f64,
    /// Cap on auxiliary nodes, sampled uniformly when exceeded.
    #[serde(default)]
    pub max_auxiliary_nodes: Option<usize>,
}

fn default_max_nodes() -> usize {
    20
}
fn default_max_steps() -> usize {
    10
}
fn default_rng_seed() -> u64 {
    42
}
fn default_neighbor_probability() -> f64 {
    1.0
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            max_nodes: default_max_nodes(),
            max_steps: default_max_steps(),
            rng_seed: default_rng_seed(),
            neighbor_probability: default_neighbor_probability(),
            max_auxiliary_nodes: None,
        }
    }
}

impl MinerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nodes < 2 {
            return Err(ConfigError::Invalid {
                message: format!("max_nodes must be at least 2, got {}", self.max_nodes),
            });
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid {
                message: "max_steps must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.neighbor_probability) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "neighbor_probability must be within [0, 1], got {}",
                    self.neighbor_probability
                ),
            });
        }
        Ok(())
    }

    /// The strategy this configuration selects, with optional endpoints.
    ///
    /// For a random walk `start` is the seed and `end` is ignored.
    pub fn strategy(&self, start: Option<String>, end: Option<String>) -> Strategy {
        match self.method {
            Method::RandomWalk => Strategy::RandomWalk {
                seed: start,
                max_steps: self.max_steps,
                max_nodes: self.max_nodes,
            },
            Method::TwoNodes => Strategy::TwoNodes {
                start,
                end,
                max_nodes: self.max_nodes,
            },
        }
    }
}

/// A traversal strategy with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    RandomWalk {
        seed: Option<String>,
        max_steps: usize,
        max_nodes: usize,
    },
    TwoNodes {
        start: Option<String>,
        end: Option<String>,
        max_nodes: usize,
    },
}

impl Strategy {
    pub fn method(&self) -> Method {
        match self {
            Self::RandomWalk { .. } => Method::RandomWalk,
            Self::TwoNodes { .. } => Method::TwoNodes,
        }
    }
}

/// Mine one subgraph with `strategy`.
pub fn extract(
    graph: &KnowledgeGraph,
    strategy: &Strategy,
    config: &MinerConfig,
    rng_seed: u64,
) -> MineResult<Subgraph> {
    match strategy {
        Strategy::RandomWalk {
            seed,
            max_steps,
            max_nodes,
        } => walk::random_walk(
            graph,
            seed.as_deref(),
            *max_steps,
            *max_nodes,
            config,
            rng_seed,
        ),
        Strategy::TwoNodes {
            start,
            end,
            max_nodes,
        } => path::two_nodes(
            graph,
            start.as_deref(),
            end.as_deref(),
            *max_nodes,
            config,
            rng_seed,
        ),
    }
}

/// Mine `count` subgraphs in parallel; item `i` uses seed `base_seed + i`.
///
/// Results come back in index order. A failed attempt does not affect others.
pub fn extract_batch(
    graph: &KnowledgeGraph,
    strategy: &Strategy,
    config: &MinerConfig,
    base_seed: u64,
    count: usize,
) -> Vec<MineResult<Subgraph>> {
    let results: Vec<MineResult<Subgraph>> = (0..count)
        .into_par_iter()
        .map(|i| extract(graph, strategy, config, base_seed.wrapping_add(i as u64)))
        .collect();
    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(
        method = %strategy.method(),
        count,
        failed,
        "mined subgraph batch"
    );
    results
}

pub(crate) fn check_max_nodes(max_nodes: usize) -> MineResult<()> {
    if max_nodes < 2 {
        return Err(MineError::InvalidBounds {
            message: format!("max_nodes must be at least 2, got {max_nodes}"),
        });
    }
    Ok(())
}

/// Build the subgraph for a fixed path, adding its one-hop neighborhood.
///
/// `rng` must be the generator that chose the path; neighbor sampling
/// continues from its state.
pub(crate) fn assemble(
    graph: &KnowledgeGraph,
    path: &[NodeIndex],
    path_edges: &[EdgeIndex],
    origin: Origin,
    config: &MinerConfig,
    rng: &mut StdRng,
    rng_seed: u64,
) -> Subgraph {
    let g = graph.graph();
    let (auxiliary_nodes, auxiliary_edges) = neighborhood(graph, path, path_edges, config, rng);

    let subgraph = Subgraph {
        path_nodes: path.iter().map(|&n| g[n].label.clone()).collect(),
        path_edges: path_edges.iter().map(|&e| SubgraphEdge::from(&g[e])).collect(),
        auxiliary_nodes: auxiliary_nodes.iter().map(|&n| g[n].label.clone()).collect(),
        auxiliary_edges: auxiliary_edges
            .iter()
            .map(|&e| SubgraphEdge::from(&g[e]))
            .collect(),
        context: None,
        origin,
        rng_seed,
        graph_stats: GraphStats {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
        },
    };
    tracing::debug!(
        method = %origin.method,
        start = subgraph.start_node(),
        end = subgraph.end_node(),
        path = subgraph.path_nodes.len(),
        auxiliary = subgraph.auxiliary_nodes.len(),
        "extracted subgraph"
    );
    subgraph
}

/// Auxiliary nodes and edges around `path`, in graph order.
fn neighborhood(
    graph: &KnowledgeGraph,
    path: &[NodeIndex],
    path_edges: &[EdgeIndex],
    config: &MinerConfig,
    rng: &mut StdRng,
) -> (Vec<NodeIndex>, Vec<EdgeIndex>) {
    let g = graph.graph();
    let on_path: HashSet<NodeIndex> = path.iter().copied().collect();
    let is_path_edge: HashSet<EdgeIndex> = path_edges.iter().copied().collect();

    let candidates: BTreeSet<EdgeIndex> = path
        .iter()
        .flat_map(|&n| graph.incident_edge_indices(n, Direction::Both))
        .filter(|e| !is_path_edge.contains(e))
        .collect();

    let mut nodes: Vec<NodeIndex> = Vec::new();
    let mut seen: HashSet<NodeIndex> = HashSet::new();
    for &e in &candidates {
        if let Some((a, b)) = g.edge_endpoints(e) {
            for n in [a, b] {
                if !on_path.contains(&n) && seen.insert(n) {
                    nodes.push(n);
                }
            }
        }
    }

    if config.neighbor_probability < 1.0 {
        let p = config.neighbor_probability.clamp(0.0, 1.0);
        nodes.retain(|_| rng.gen_bool(p));
    }
    if let Some(cap) = config.max_auxiliary_nodes {
        if nodes.len() > cap {
            let mut picked = rand::seq::index::sample(rng, nodes.len(), cap).into_vec();
            picked.sort_unstable();
            nodes = picked.into_iter().map(|i| nodes[i]).collect();
        }
    }

    let kept: HashSet<NodeIndex> = nodes.iter().copied().collect();
    let keep = |n: NodeIndex| on_path.contains(&n) || kept.contains(&n);
    let edges = candidates
        .into_iter()
        .filter(|&e| {
            g.edge_endpoints(e)
                .is_some_and(|(a, b)| keep(a) && keep(b))
        })
        .collect();
    (nodes, edges)
}
