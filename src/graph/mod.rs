//! Knowledge graph data model.
//!
//! Triples enter the graph through [`crate::engine::Engine::ingest`]. Nodes are
//! keyed by canonical label; edges are value records referencing labels and
//! are identified by `(source, target, relation)`.
//!
//! - [`index::KnowledgeGraph`]: the petgraph-backed store
//! - [`traverse`]: breadth-first helpers shared by the subgraph miner

pub mod index;
pub mod traverse;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Free-form metadata attached to a triple or node.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A (subject, relation, object) fact extracted from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity label.
    #[serde(alias = "node_1")]
    pub subject: String,
    /// Relation (free-text predicate).
    #[serde(alias = "edge")]
    pub relation: String,
    /// Object entity label.
    #[serde(alias = "node_2")]
    pub object: String,
    /// Stable identifier of this triple in its source.
    #[serde(default)]
    pub triplet_id: String,
    /// Optional source metadata (paper id, chunk id, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
        triplet_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
            triplet_id: triplet_id.into(),
            metadata: None,
        }
    }

    /// Attach source metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Trimmed copy, or `MalformedTriple` naming the first blank field.
    pub fn validated(&self) -> Result<Triple, GraphError> {
        let check = |value: &str, field: &'static str| {
            let t = value.trim();
            if t.is_empty() {
                Err(GraphError::MalformedTriple { field })
            } else {
                Ok(t.to_owned())
            }
        };
        Ok(Triple {
            subject: check(&self.subject, "subject")?,
            relation: check(&self.relation, "relation")?,
            object: check(&self.object, "object")?,
            triplet_id: check(&self.triplet_id, "triplet_id")?,
            metadata: self.metadata.clone(),
        })
    }

    /// The source reference this triple contributes to nodes and edges.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            relation: self.relation.clone(),
            triplet_id: self.triplet_id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.object)
    }
}

/// Reference to an originating triple.
///
/// Set identity is `(relation, triplet_id)`; metadata rides along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub relation: String,
    pub triplet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl SourceRef {
    fn same_source(&self, other: &SourceRef) -> bool {
        self.relation == other.relation && self.triplet_id == other.triplet_id
    }
}

/// Insertion-ordered set of [`SourceRef`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSet(Vec<SourceRef>);

impl SourceSet {
    /// Add `source` unless an equal reference is present. Returns whether it was added.
    pub fn insert(&mut self, source: SourceRef) -> bool {
        if self.0.iter().any(|s| s.same_source(&source)) {
            return false;
        }
        self.0.push(source);
        true
    }

    /// Union `other` into `self`, keeping first-seen order.
    pub fn extend(&mut self, other: impl IntoIterator<Item = SourceRef>) {
        for s in other {
            self.insert(s);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceRef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_triplet(&self, triplet_id: &str) -> bool {
        self.0.iter().any(|s| s.triplet_id == triplet_id)
    }
}

impl IntoIterator for SourceSet {
    type Item = SourceRef;
    type IntoIter = std::vec::IntoIter<SourceRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A canonical entity in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical label, unique in the graph.
    pub label: String,
    /// Triples mentioning this entity (under any alias).
    pub sources: SourceSet,
    /// Surface labels that resolved to this node, excluding the label itself.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Free-form attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
    /// Position in node-creation order.
    pub ordinal: usize,
}

impl Node {
    pub fn new(label: impl Into<String>, ordinal: usize) -> Self {
        Self {
            label: label.into(),
            sources: SourceSet::default(),
            aliases: Vec::new(),
            attrs: BTreeMap::new(),
            ordinal,
        }
    }

    /// Record `alias` unless it is the label itself or already known.
    pub fn add_alias(&mut self, alias: &str) {
        if alias != self.label && !self.aliases.iter().any(|a| a == alias) {
            self.aliases.push(alias.to_owned());
        }
    }
}

/// A directed, relation-labelled edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
    /// Triples supporting this edge.
    #[serde(default)]
    pub sources: SourceSet,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            sources: SourceSet::default(),
        }
    }

    /// Identity key of this edge.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation: self.relation.clone(),
        }
    }

    /// Whether this edge joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Identity of an edge: ordered pair plus relation label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Which incident edges of a node a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}
