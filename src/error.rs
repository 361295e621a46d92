//! Diagnostic error types for the ideagraph engine and miner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. [`IdeaError`] wraps them all so the
//! binary can surface the full diagnostic chain.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type.
///
/// Each variant wraps a subsystem-specific error, preserving the error codes
/// and help text through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum IdeaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mine(#[from] MineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Context(#[from] ContextError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("malformed triple: {field} is empty")]
    #[diagnostic(
        code(ideagraph::graph::malformed_triple),
        help(
            "Every triple needs a non-blank subject, relation, object and triplet id. \
             The triple was rejected; other triples in the batch are unaffected."
        )
    )]
    MalformedTriple { field: &'static str },

    #[error("node not found: \"{label}\"")]
    #[diagnostic(
        code(ideagraph::graph::not_found),
        help(
            "No node carries this canonical label. Labels that were merged into \
             another node are only reachable through the canonical label; use \
             `Engine::resolve` to find it."
        )
    )]
    NotFound { label: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),
}

// ---------------------------------------------------------------------------
// Embedding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmbedError {
    #[error("cannot embed empty text")]
    #[diagnostic(
        code(ideagraph::embed::empty_input),
        help("Entity labels must contain at least one non-whitespace character.")
    )]
    EmptyInput,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(ideagraph::embed::dim_mismatch),
        help(
            "All embeddings in one similarity index must share a dimension. \
             Check that the embedder was not swapped between ingest calls."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding backend failed: {message}")]
    #[diagnostic(
        code(ideagraph::embed::backend),
        help(
            "The external embedding service reported an error. \
             Retry policy belongs to the embedder."
        )
    )]
    Backend { message: String },
}

// ---------------------------------------------------------------------------
// Miner errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MineError {
    #[error("cannot mine a subgraph from an empty graph")]
    #[diagnostic(
        code(ideagraph::mine::empty_graph),
        help("Ingest some triples (or load a snapshot) before extracting subgraphs.")
    )]
    EmptyGraph,

    #[error("seed node \"{label}\" is not in the graph")]
    #[diagnostic(
        code(ideagraph::mine::disconnected_seed),
        help("Pass a canonical node label, or omit the seed to sample one.")
    )]
    DisconnectedSeed { label: String },

    #[error("no path from \"{start}\" to \"{end}\" within {max_nodes} nodes")]
    #[diagnostic(
        code(ideagraph::mine::no_path_within_bound),
        help(
            "Neither a directed nor an undirected path fits the bound. \
             Increase `max_nodes` or pick endpoints in the same component."
        )
    )]
    NoPathWithinBound {
        start: String,
        end: String,
        max_nodes: usize,
    },

    #[error("random walk cannot leave \"{label}\": no outgoing edges")]
    #[diagnostic(
        code(ideagraph::mine::dead_end),
        help("A walk needs at least one hop. Choose a seed with outgoing edges.")
    )]
    DeadEnd { label: String },

    #[error("graph has no node with outgoing edges to start a walk from")]
    #[diagnostic(
        code(ideagraph::mine::no_walkable_node),
        help("Every node is a sink. Ingest triples before mining.")
    )]
    NoWalkableNode,

    #[error("two-endpoint extraction needs two distinct endpoints, got \"{start}\" and \"{end}\"")]
    #[diagnostic(
        code(ideagraph::mine::degenerate_endpoints),
        help("Pick different start and end nodes; the graph needs at least two nodes.")
    )]
    DegenerateEndpoints { start: String, end: String },

    #[error("invalid miner bounds: {message}")]
    #[diagnostic(
        code(ideagraph::mine::invalid_bounds),
        help("`max_steps` must be at least 1 and `max_nodes` at least 2.")
    )]
    InvalidBounds { message: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(ideagraph::store::io),
        help(
            "A filesystem operation failed. Check that the path exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(ideagraph::store::serde),
        help(
            "Failed to serialize or deserialize data. The file may be truncated, \
             or was written in a different format than its extension suggests."
        )
    )]
    Serialization { message: String },

    #[error("unsupported snapshot version {found} (expected {expected})")]
    #[diagnostic(
        code(ideagraph::store::version),
        help("Rebuild the graph from its source triples with this version of ideagraph.")
    )]
    UnsupportedVersion { found: u32, expected: u32 },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(ideagraph::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(ideagraph::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(ideagraph::config::invalid), help("{message}"))]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Contextualization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error("contextualization failed: {message}")]
    #[diagnostic(
        code(ideagraph::context::failed),
        help(
            "The text-generation collaborator returned an error. \
             The subgraph itself is unaffected."
        )
    )]
    Failed { message: String },
}

/// Convenience alias for functions returning ideagraph results.
pub type IdeaResult<T> = std::result::Result<T, IdeaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_idea_error() {
        let err = GraphError::NotFound {
            label: "telomerase".into(),
        };
        let top: IdeaError = err.into();
        assert!(matches!(top, IdeaError::Graph(GraphError::NotFound { .. })));
    }

    #[test]
    fn embed_error_wraps_into_graph_error() {
        let graph_err: GraphError = EmbedError::EmptyInput.into();
        assert!(matches!(graph_err, GraphError::Embed(EmbedError::EmptyInput)));
    }

    #[test]
    fn display_messages_are_descriptive() {
        let err = MineError::NoPathWithinBound {
            start: "NAD+".into(),
            end: "sirtuin".into(),
            max_nodes: 4,
        };
        let msg = format!("{err}");
        assert!(msg.contains("NAD+"));
        assert!(msg.contains("sirtuin"));
        assert!(msg.contains('4'));
    }
}
