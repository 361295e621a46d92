// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ideagraph
//!
//! Builds a knowledge graph from (subject, relation, object) triples extracted
//! from scientific literature, merging entities whose labels embed close
//! together, and mines small path-shaped subgraphs from it for use as prompts.
//!
//! ## Architecture
//!
//! - **Embedding** (`embed`): label → vector, with a deterministic hashing embedder
//! - **Similarity index** (`similarity`): exact cosine search with stable tie-breaks
//! - **Knowledge graph** (`graph`): petgraph-backed store keyed by canonical label
//! - **Engine** (`engine`): ingest with entity resolution, queries, snapshots
//! - **Snapshots** (`store`): bincode/JSON, written atomically
//! - **Miner** (`mine`): seeded random walks and two-endpoint shortest paths
//! - **Subgraphs** (`subgraph`): immutable results, text form, JSON documents
//!
//! ## Library usage
//!
//! ```no_run
//! use ideagraph::engine::{Engine, EngineConfig};
//! use ideagraph::graph::Triple;
//! use ideagraph::mine::{self, MinerConfig, Strategy};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.ingest(&Triple::new("NAD+", "activates", "SIRT1", "t1")).unwrap();
//! engine.ingest(&Triple::new("SIRT1", "deacetylates", "PGC-1α", "t2")).unwrap();
//!
//! let strategy = Strategy::TwoNodes {
//!     start: Some("NAD+".into()),
//!     end: Some("PGC-1α".into()),
//!     max_nodes: 5,
//! };
//! let sg = mine::extract(engine.graph(), &strategy, &MinerConfig::default(), 42).unwrap();
//! println!("{}", sg.to_textual_representation());
//! ```

pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod graph;
pub mod mine;
pub mod similarity;
pub mod store;
pub mod subgraph;
