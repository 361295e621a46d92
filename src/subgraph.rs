//! Mined subgraphs: immutable path-centred extracts of the knowledge graph.
//!
//! A [`Subgraph`] owns copies of every label and edge it mentions, so it stays
//! valid after the source graph grows. It renders to a line-per-edge text
//! form consumed by hypothesis-generating agents, and to the JSON
//! [`SubgraphDocument`] exchange format.
//!
//! Text form, one edge per line, lines joined by `",\n"`:
//!
//! ```text
//! (NAD+)-[:activates]->(SIRT1),
//! (SIRT1)-[:deacetylates]->(PGC-1α)
//! ```
//!
//! Inside labels `\`, `(`, `)`, `[` and `]` are backslash-escaped and line
//! breaks are written as `\n`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, StoreError};
use crate::graph::Edge;
use crate::mine::Method;
use crate::store::{read_file, write_atomic, StoreResult};

/// Prompt asking an agent to define and relate the concepts of a subgraph.
pub const ANALYSIS_PROMPT: &str = "\
You are an ontologist trained in scientific research, engineering and innovation.

Below is a list of concepts and relationships taken from a knowledge graph, \
connecting \"{start_node}\" and \"{end_node}\".

Each line has the form \"(node_1)-[:relationship between node_1 and node_2]->(node_2)\".

Here is the graph:

{graph_str}

Use every concept in the graph. Do not add an introduction. First define each \
term in the graph, then discuss each relationship in context.";

/// A directed edge as recorded in a subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl SubgraphEdge {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }

    /// Whether this edge joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    /// `(subject)-[:relation]->(object)` with labels escaped.
    pub fn to_line(&self) -> String {
        format!(
            "({})-[:{}]->({})",
            escape(&self.source),
            escape(&self.relation),
            escape(&self.target)
        )
    }
}

impl From<&Edge> for SubgraphEdge {
    fn from(e: &Edge) -> Self {
        Self {
            source: e.source.clone(),
            target: e.target.clone(),
            relation: e.relation.clone(),
        }
    }
}

/// Whether the primary path follows edge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Directed,
    /// Found by ignoring direction; path edges may point backwards.
    Undirected,
}

/// How a subgraph was mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub method: Method,
    pub path_kind: PathKind,
}

/// Size of the source graph when the subgraph was mined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// Supplies free-text context for a subgraph (e.g. an LLM call).
pub trait Contextualizer {
    /// Answer `prompt`, usually [`Subgraph::analysis_prompt`].
    fn contextualize(&self, prompt: &str) -> Result<String, ContextError>;
}

/// A bounded, path-centred extract of a knowledge graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    pub(crate) path_nodes: Vec<String>,
    pub(crate) path_edges: Vec<SubgraphEdge>,
    pub(crate) auxiliary_nodes: Vec<String>,
    pub(crate) auxiliary_edges: Vec<SubgraphEdge>,
    pub(crate) context: Option<String>,
    pub(crate) origin: Origin,
    pub(crate) rng_seed: u64,
    pub(crate) graph_stats: GraphStats,
}

impl Subgraph {
    pub fn start_node(&self) -> &str {
        // path_nodes is never empty (at least two nodes).
        self.path_nodes.first().map(String::as_str).unwrap_or_default()
    }

    pub fn end_node(&self) -> &str {
        self.path_nodes.last().map(String::as_str).unwrap_or_default()
    }

    /// Nodes of the primary path, in order.
    pub fn path_nodes(&self) -> &[String] {
        &self.path_nodes
    }

    /// `path_edges()[i]` joins `path_nodes()[i]` and `path_nodes()[i + 1]`.
    pub fn path_edges(&self) -> &[SubgraphEdge] {
        &self.path_edges
    }

    pub fn auxiliary_nodes(&self) -> &[String] {
        &self.auxiliary_nodes
    }

    pub fn auxiliary_edges(&self) -> &[SubgraphEdge] {
        &self.auxiliary_edges
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn graph_stats(&self) -> GraphStats {
        self.graph_stats
    }

    /// Path edges in path order, then auxiliary edges in graph order.
    pub fn edges(&self) -> impl Iterator<Item = &SubgraphEdge> {
        self.path_edges.iter().chain(self.auxiliary_edges.iter())
    }

    /// Path nodes followed by auxiliary nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.path_nodes
            .iter()
            .chain(self.auxiliary_nodes.iter())
            .map(String::as_str)
    }

    /// One `(s)-[:r]->(o)` line per edge, joined by `",\n"`.
    pub fn to_textual_representation(&self) -> String {
        self.edges()
            .map(SubgraphEdge::to_line)
            .collect::<Vec<_>>()
            .join(",\n")
    }

    /// Fill `{start_node}`, `{end_node}` and `{graph_str}` in `template`.
    pub fn render_prompt(&self, template: &str) -> String {
        template
            .replace("{start_node}", self.start_node())
            .replace("{end_node}", self.end_node())
            .replace("{graph_str}", &self.to_textual_representation())
    }

    /// [`ANALYSIS_PROMPT`] rendered for this subgraph.
    pub fn analysis_prompt(&self) -> String {
        self.render_prompt(ANALYSIS_PROMPT)
    }

    /// A copy of this subgraph with `context` produced by `contextualizer`
    /// from the [`ANALYSIS_PROMPT`].
    pub fn contextualize(
        &self,
        contextualizer: &dyn Contextualizer,
    ) -> Result<Subgraph, ContextError> {
        self.contextualize_with(contextualizer, ANALYSIS_PROMPT)
    }

    /// Like [`Subgraph::contextualize`], rendering `template` instead
    /// (see [`Subgraph::render_prompt`]).
    pub fn contextualize_with(
        &self,
        contextualizer: &dyn Contextualizer,
        template: &str,
    ) -> Result<Subgraph, ContextError> {
        let context = contextualizer.contextualize(&self.render_prompt(template))?;
        Ok(Subgraph {
            context: Some(context),
            ..self.clone()
        })
    }

    /// The exchange document for this subgraph.
    pub fn to_document(&self) -> SubgraphDocument {
        SubgraphDocument {
            start_node: self.start_node().to_owned(),
            end_node: self.end_node().to_owned(),
            path_nodes: self.path_nodes.clone(),
            path_edges: self.path_edges.clone(),
            auxiliary_nodes: self.auxiliary_nodes.clone(),
            auxiliary_edges: self.auxiliary_edges.clone(),
            context: self.context.clone(),
            origin: self.origin,
            rng_seed: self.rng_seed,
            graph_stats: self.graph_stats,
        }
    }

    /// Atomically write the JSON exchange document to `path`.
    pub fn save_to_file(&self, path: &Path) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.to_document()).map_err(|e| {
            StoreError::Serialization {
                message: format!("failed to encode subgraph: {e}"),
            }
        })?;
        write_atomic(path, &bytes)
    }

    /// Read and validate a JSON exchange document.
    pub fn load_from_file(path: &Path) -> StoreResult<Self> {
        let bytes = read_file(path)?;
        let doc: SubgraphDocument =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
                message: format!("failed to decode subgraph {}: {e}", path.display()),
            })?;
        Subgraph::try_from(doc)
    }
}

impl std::fmt::Display for Subgraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_textual_representation())
    }
}

/// Stable JSON form of a [`Subgraph`] handed to external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphDocument {
    pub start_node: String,
    pub end_node: String,
    pub path_nodes: Vec<String>,
    pub path_edges: Vec<SubgraphEdge>,
    #[serde(default)]
    pub auxiliary_nodes: Vec<String>,
    #[serde(default)]
    pub auxiliary_edges: Vec<SubgraphEdge>,
    pub context: Option<String>,
    pub origin: Origin,
    pub rng_seed: u64,
    #[serde(default)]
    pub graph_stats: GraphStats,
}

impl TryFrom<SubgraphDocument> for Subgraph {
    type Error = StoreError;

    /// Checks the path invariants before accepting a document.
    fn try_from(doc: SubgraphDocument) -> Result<Self, Self::Error> {
        let invalid = |message: String| StoreError::Serialization { message };

        if doc.path_nodes.len() < 2 {
            return Err(invalid(format!(
                "subgraph path needs at least 2 nodes, found {}",
                doc.path_nodes.len()
            )));
        }
        if doc.path_edges.len() + 1 != doc.path_nodes.len() {
            return Err(invalid(format!(
                "{} path nodes need {} path edges, found {}",
                doc.path_nodes.len(),
                doc.path_nodes.len() - 1,
                doc.path_edges.len()
            )));
        }
        for (i, (pair, edge)) in doc.path_nodes.windows(2).zip(&doc.path_edges).enumerate() {
            let connects = match doc.origin.path_kind {
                PathKind::Directed => edge.source == pair[0] && edge.target == pair[1],
                PathKind::Undirected => edge.joins(&pair[0], &pair[1]),
            };
            if !connects {
                return Err(invalid(format!(
                    "path edge {i} does not connect \"{}\" and \"{}\"",
                    pair[0], pair[1]
                )));
            }
        }
        if doc.path_nodes.first() != Some(&doc.start_node)
            || doc.path_nodes.last() != Some(&doc.end_node)
        {
            return Err(invalid(
                "start_node/end_node do not match the path endpoints".into(),
            ));
        }

        Ok(Subgraph {
            path_nodes: doc.path_nodes,
            path_edges: doc.path_edges,
            auxiliary_nodes: doc.auxiliary_nodes,
            auxiliary_edges: doc.auxiliary_edges,
            context: doc.context,
            origin: doc.origin,
            rng_seed: doc.rng_seed,
            graph_stats: doc.graph_stats,
        })
    }
}

// ---------------------------------------------------------------------------
// Text form
// ---------------------------------------------------------------------------

fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '\\' | '(' | ')' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Parse the output of [`Subgraph::to_textual_representation`] back into edges.
pub fn parse_textual_representation(text: &str) -> StoreResult<Vec<SubgraphEdge>> {
    let mut edges = Vec::new();
    let mut lines = text.lines().enumerate().peekable();
    while let Some((no, raw)) = lines.next() {
        let is_last = lines.peek().is_none();
        let line = if is_last {
            raw
        } else {
            raw.strip_suffix(',').ok_or_else(|| StoreError::Serialization {
                message: format!("line {}: expected trailing ','", no + 1),
            })?
        };
        if line.trim().is_empty() && is_last {
            continue;
        }
        edges.push(parse_line(line).map_err(|message| StoreError::Serialization {
            message: format!("line {}: {message}", no + 1),
        })?);
    }
    Ok(edges)
}

fn parse_line(line: &str) -> Result<SubgraphEdge, String> {
    let mut chars = line.chars();
    expect(&mut chars, "(")?;
    let source = read_label(&mut chars, ')')?;
    expect(&mut chars, "-[:")?;
    let relation = read_label(&mut chars, ']')?;
    expect(&mut chars, "->(")?;
    let target = read_label(&mut chars, ')')?;
    if let Some(c) = chars.next() {
        return Err(format!("unexpected '{c}' after edge"));
    }
    Ok(SubgraphEdge {
        source,
        target,
        relation,
    })
}

fn expect(chars: &mut impl Iterator<Item = char>, token: &str) -> Result<(), String> {
    for want in token.chars() {
        match chars.next() {
            Some(c) if c == want => {}
            Some(c) => return Err(format!("expected '{want}' but found '{c}'")),
            None => return Err(format!("expected '{want}' but the line ended")),
        }
    }
    Ok(())
}

/// Read an escaped label up to (and consuming) the unescaped `close`.
fn read_label(chars: &mut impl Iterator<Item = char>, close: char) -> Result<String, String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some(e @ ('\\' | '(' | ')' | '[' | ']')) => out.push(e),
                Some(e) => return Err(format!("unknown escape '\\{e}'")),
                None => return Err("dangling '\\'".into()),
            },
            c if c == close => return Ok(out),
            c => out.push(c),
        }
    }
    Err(format!("unterminated label, expected '{close}'"))
}
