//! In-memory knowledge graph keyed by canonical label.
//!
//! Uses a `petgraph` `DiGraph` for structure plus hash maps from label to
//! `NodeIndex` and from [`EdgeKey`] to `EdgeIndex`. Nodes and edges are never
//! removed, so petgraph indices equal creation order; every query returning
//! several items returns them in that order.
//!
//! Mutation is crate-private: only the [`crate::engine::Engine`] and the
//! snapshot loader add nodes and edges.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::GraphError;

use super::{Direction, Edge, EdgeKey, Node, SourceRef};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Label-keyed directed multigraph of entities and relations.
#[derive(Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<Node, Edge>,
    node_index: HashMap<String, NodeIndex>,
    edge_index: HashMap<EdgeKey, EdgeIndex>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a node with `label` exists, returning its index.
    pub(crate) fn ensure_node(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(label) {
            return idx;
        }
        let ordinal = self.graph.node_count();
        let idx = self.graph.add_node(Node::new(label, ordinal));
        self.node_index.insert(label.to_owned(), idx);
        idx
    }

    pub(crate) fn node_mut(&mut self, label: &str) -> Option<&mut Node> {
        let idx = *self.node_index.get(label)?;
        self.graph.node_weight_mut(idx)
    }

    /// Insert the edge or merge `source` into the existing one.
    ///
    /// Both endpoints must already exist. Returns `true` when a new edge was created.
    pub(crate) fn upsert_edge(
        &mut self,
        from: &str,
        to: &str,
        relation: &str,
        source: SourceRef,
    ) -> GraphResult<bool> {
        let key = EdgeKey {
            source: from.to_owned(),
            target: to.to_owned(),
            relation: relation.to_owned(),
        };
        if let Some(&ei) = self.edge_index.get(&key) {
            if let Some(edge) = self.graph.edge_weight_mut(ei) {
                edge.sources.insert(source);
            }
            return Ok(false);
        }

        let a = self.require(from)?;
        let b = self.require(to)?;
        let mut edge = Edge::new(from, to, relation);
        edge.sources.insert(source);
        let ei = self.graph.add_edge(a, b, edge);
        self.edge_index.insert(key, ei);
        Ok(true)
    }

    /// Rebuild a graph from node and edge records (snapshot restore).
    ///
    /// Nodes are re-added in ordinal order; edges in the given order. Edges
    /// referencing unknown nodes are rejected.
    pub(crate) fn from_parts(mut nodes: Vec<Node>, edges: Vec<Edge>) -> GraphResult<Self> {
        nodes.sort_by_key(|n| n.ordinal);
        let mut kg = Self::new();
        for (ordinal, mut node) in nodes.into_iter().enumerate() {
            node.ordinal = ordinal;
            let label = node.label.clone();
            let idx = kg.graph.add_node(node);
            kg.node_index.insert(label, idx);
        }
        for edge in edges {
            let a = kg.require(&edge.source)?;
            let b = kg.require(&edge.target)?;
            let key = edge.key();
            if let Some(&ei) = kg.edge_index.get(&key) {
                if let Some(existing) = kg.graph.edge_weight_mut(ei) {
                    existing.sources.extend(edge.sources);
                }
                continue;
            }
            let ei = kg.graph.add_edge(a, b, edge);
            kg.edge_index.insert(key, ei);
        }
        Ok(kg)
    }

    fn require(&self, label: &str) -> GraphResult<NodeIndex> {
        self.node_index
            .get(label)
            .copied()
            .ok_or_else(|| GraphError::NotFound {
                label: label.to_owned(),
            })
    }

    /// Look up a node by canonical label.
    pub fn get_node(&self, label: &str) -> GraphResult<&Node> {
        let idx = self.require(label)?;
        Ok(&self.graph[idx])
    }

    /// Incident edges of `label` in creation order.
    ///
    /// With [`Direction::Both`] a self-loop is returned once.
    pub fn get_edges(&self, label: &str, direction: Direction) -> GraphResult<Vec<&Edge>> {
        let idx = self.require(label)?;
        Ok(self
            .incident_edge_indices(idx, direction)
            .into_iter()
            .map(|ei| &self.graph[ei])
            .collect())
    }

    /// Incident edge indices of a node, sorted by creation order.
    pub fn incident_edge_indices(&self, idx: NodeIndex, direction: Direction) -> Vec<EdgeIndex> {
        let mut out: Vec<EdgeIndex> = match direction {
            Direction::Outgoing => self
                .graph
                .edges_directed(idx, petgraph::Direction::Outgoing)
                .map(|e| e.id())
                .collect(),
            Direction::Incoming => self
                .graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .map(|e| e.id())
                .collect(),
            Direction::Both => self
                .graph
                .edges_directed(idx, petgraph::Direction::Outgoing)
                .chain(self.graph.edges_directed(idx, petgraph::Direction::Incoming))
                .map(|e| e.id())
                .collect(),
        };
        // petgraph walks adjacency lists newest-first.
        out.sort();
        out.dedup();
        out
    }

    /// Free-form attributes of a node.
    pub fn get_node_attrs(
        &self,
        label: &str,
    ) -> GraphResult<&std::collections::BTreeMap<String, serde_json::Value>> {
        Ok(&self.get_node(label)?.attrs)
    }

    /// All nodes in creation order.
    pub fn get_all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// All edges in creation order.
    pub fn get_all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Edges from `from` to `to` (directed), in creation order.
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&Edge> {
        let (Some(&a), Some(&b)) = (self.node_index.get(from), self.node_index.get(to)) else {
            return Vec::new();
        };
        let mut found: Vec<EdgeIndex> = self.graph.edges_connecting(a, b).map(|e| e.id()).collect();
        found.sort();
        found.into_iter().map(|ei| &self.graph[ei]).collect()
    }

    /// Look up an edge by identity key.
    pub fn get_edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edge_index.get(key).map(|&ei| &self.graph[ei])
    }

    /// Check if a node exists.
    pub fn has_node(&self, label: &str) -> bool {
        self.node_index.contains_key(label)
    }

    /// Index of a node, for traversal code working on the raw graph.
    pub fn index_of(&self, label: &str) -> Option<NodeIndex> {
        self.node_index.get(label).copied()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Distinct relation labels.
    pub fn relations(&self) -> BTreeSet<&str> {
        self.graph
            .edge_weights()
            .map(|e| e.relation.as_str())
            .collect()
    }

    /// Read-only access to the underlying petgraph structure.
    pub fn graph(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
