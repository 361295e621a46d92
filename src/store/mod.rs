//! Snapshot persistence for the knowledge graph.
//!
//! A [`Snapshot`] is a versioned, self-contained record of every node and
//! edge in creation order. It is encoded with `bincode` by default, or as
//! JSON when the target path ends in `.json`.
//!
//! All writes go through [`write_atomic`]: the payload lands in a temporary
//! file in the destination directory, is synced, then renamed over the
//! target. A failure part-way leaves any previous file untouched.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{GraphError, StoreError};
use crate::graph::index::KnowledgeGraph;
use crate::graph::{Edge, Metadata, Node, SourceRef, SourceSet, Triple};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Current snapshot layout version.
pub const FORMAT_VERSION: u32 = 1;

/// On-disk encoding of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Bincode,
    Json,
}

impl SnapshotFormat {
    /// JSON for a `.json` extension, bincode otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Bincode,
        }
    }
}

/// Serialized form of a [`SourceRef`].
///
/// Metadata travels as embedded JSON text: `bincode` cannot decode
/// self-describing values such as `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub relation: String,
    pub triplet_id: String,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: String,
    pub ordinal: usize,
    pub aliases: Vec<String>,
    pub sources: Vec<SourceRecord>,
    /// Attribute map as JSON text.
    pub attrs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub sources: Vec<SourceRecord>,
}

/// Versioned image of a knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

fn ser_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        message: e.to_string(),
    }
}

fn encode_sources(sources: &SourceSet) -> StoreResult<Vec<SourceRecord>> {
    sources
        .iter()
        .map(|s| {
            Ok(SourceRecord {
                relation: s.relation.clone(),
                triplet_id: s.triplet_id.clone(),
                metadata: s
                    .metadata
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(ser_err)?,
            })
        })
        .collect()
}

fn decode_sources(records: Vec<SourceRecord>) -> StoreResult<SourceSet> {
    let mut set = SourceSet::default();
    for r in records {
        let metadata = r
            .metadata
            .map(|m| serde_json::from_str::<Metadata>(&m))
            .transpose()
            .map_err(ser_err)?;
        set.insert(SourceRef {
            relation: r.relation,
            triplet_id: r.triplet_id,
            metadata,
        });
    }
    Ok(set)
}

impl Snapshot {
    /// Capture every node and edge of `graph` in creation order.
    pub fn capture(graph: &KnowledgeGraph) -> StoreResult<Self> {
        let nodes = graph
            .get_all_nodes()
            .map(|n| {
                Ok(NodeRecord {
                    label: n.label.clone(),
                    ordinal: n.ordinal,
                    aliases: n.aliases.clone(),
                    sources: encode_sources(&n.sources)?,
                    attrs: serde_json::to_string(&n.attrs).map_err(ser_err)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let edges = graph
            .get_all_edges()
            .map(|e| {
                Ok(EdgeRecord {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    relation: e.relation.clone(),
                    sources: encode_sources(&e.sources)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self {
            format_version: FORMAT_VERSION,
            nodes,
            edges,
        })
    }

    /// Rebuild the graph this snapshot was captured from.
    pub fn restore(self) -> StoreResult<KnowledgeGraph> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for r in self.nodes {
            let mut node = Node::new(r.label, r.ordinal);
            node.aliases = r.aliases;
            node.sources = decode_sources(r.sources)?;
            node.attrs = serde_json::from_str(&r.attrs).map_err(ser_err)?;
            nodes.push(node);
        }
        let mut edges = Vec::with_capacity(self.edges.len());
        for r in self.edges {
            let mut edge = Edge::new(r.source, r.target, r.relation);
            edge.sources = decode_sources(r.sources)?;
            edges.push(edge);
        }
        KnowledgeGraph::from_parts(nodes, edges).map_err(|e| match e {
            GraphError::NotFound { label } => StoreError::Serialization {
                message: format!("snapshot edge references unknown node \"{label}\""),
            },
            other => ser_err(other),
        })
    }

    /// Encode in the given format.
    pub fn encode(&self, format: SnapshotFormat) -> StoreResult<Vec<u8>> {
        match format {
            SnapshotFormat::Bincode => bincode::serialize(self).map_err(ser_err),
            SnapshotFormat::Json => serde_json::to_vec_pretty(self).map_err(ser_err),
        }
    }

    /// Decode from bytes in the given format.
    pub fn decode(bytes: &[u8], format: SnapshotFormat) -> StoreResult<Self> {
        match format {
            SnapshotFormat::Bincode => bincode::deserialize(bytes).map_err(ser_err),
            SnapshotFormat::Json => serde_json::from_slice(bytes).map_err(ser_err),
        }
    }

    /// Atomically write this snapshot to `path`.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let bytes = self.encode(SnapshotFormat::from_path(path))?;
        write_atomic(path, &bytes)
    }

    /// Read a snapshot from `path`.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let bytes = read_file(path)?;
        Self::decode(&bytes, SnapshotFormat::from_path(path))
    }
}

/// Read triples from a JSON array or JSON Lines file.
///
/// Triples without a `triplet_id` get `"{file_stem}:{n}"`, where `n` is the
/// array index or the 1-based line number.
pub fn read_triples(path: &Path) -> StoreResult<Vec<Triple>> {
    let bytes = read_file(path)?;
    let text = String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
        message: format!("{} is not UTF-8: {e}", path.display()),
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_owned();

    let mut numbered: Vec<(usize, Triple)> = Vec::new();
    if text.trim_start().starts_with('[') {
        let triples: Vec<Triple> = serde_json::from_str(&text).map_err(|e| {
            StoreError::Serialization {
                message: format!("{}: {e}", path.display()),
            }
        })?;
        numbered.extend(triples.into_iter().enumerate());
    } else {
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let triple: Triple =
                serde_json::from_str(line).map_err(|e| StoreError::Serialization {
                    message: format!("{}:{}: {e}", path.display(), i + 1),
                })?;
            numbered.push((i + 1, triple));
        }
    }

    Ok(numbered
        .into_iter()
        .map(|(n, mut t)| {
            if t.triplet_id.trim().is_empty() {
                t.triplet_id = format!("{stem}:{n}");
            }
            t
        })
        .collect())
}

/// Read a whole file, mapping failures to [`StoreError::Io`].
pub fn read_file(path: &Path) -> StoreResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Replace `path` with `bytes` via a synced temporary file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote file atomically");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample_graph() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        kg.ensure_node("NAD+");
        kg.ensure_node("SIRT1");
        let mut meta = Metadata::new();
        meta.insert("paper".into(), serde_json::json!("doi:10/xyz"));
        let source = SourceRef {
            relation: "activates".into(),
            triplet_id: "p1:0".into(),
            metadata: Some(meta),
        };
        kg.upsert_edge("NAD+", "SIRT1", "activates", source.clone())
            .unwrap();
        let node = kg.node_mut("NAD+").unwrap();
        node.sources.insert(source);
        node.add_alias("nad+");
        node.attrs.insert("kind".into(), serde_json::json!("metabolite"));
        kg
    }

    #[test]
    fn bincode_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.bin");
        let kg = sample_graph();

        Snapshot::capture(&kg).unwrap().save(&path).unwrap();
        let restored = Snapshot::load(&path).unwrap().restore().unwrap();

        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.edge_count(), 1);
        let node = restored.get_node("NAD+").unwrap();
        assert_eq!(node.aliases, vec!["nad+".to_string()]);
        assert_eq!(node.attrs["kind"], serde_json::json!("metabolite"));
        let src = node.sources.iter().next().unwrap();
        assert_eq!(
            src.metadata.as_ref().unwrap()["paper"],
            serde_json::json!("doi:10/xyz")
        );
    }

    #[test]
    fn json_chosen_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        Snapshot::capture(&sample_graph())
            .unwrap()
            .save(&path)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"format_version\": 1"));
        assert_eq!(SnapshotFormat::from_path(&path), SnapshotFormat::Json);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Snapshot::load(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn garbage_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(StoreError::Serialization { .. })
        ));
    }

    #[test]
    fn newer_version_rejected() {
        let mut snap = Snapshot::capture(&sample_graph()).unwrap();
        snap.format_version = FORMAT_VERSION + 1;
        assert!(matches!(
            snap.restore(),
            Err(StoreError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn reads_json_array_and_fills_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper42.json");
        std::fs::write(
            &path,
            r#"[
                {"subject": "A", "relation": "causes", "object": "B", "triplet_id": "x1"},
                {"node_1": "B", "edge": "causes", "node_2": "C"}
            ]"#,
        )
        .unwrap();
        let triples = read_triples(&path).unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].triplet_id, "x1");
        assert_eq!(triples[1].triplet_id, "paper42:1");
        assert_eq!(triples[1].subject, "B");
    }

    #[test]
    fn reads_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.jsonl");
        std::fs::write(
            &path,
            "{\"subject\": \"A\", \"relation\": \"r\", \"object\": \"B\"}\n\n\
             {\"subject\": \"B\", \"relation\": \"r\", \"object\": \"C\", \
             \"metadata\": {\"doi\": \"10/1\"}}\n",
        )
        .unwrap();
        let triples = read_triples(&path).unwrap();
        assert_eq!(triples[0].triplet_id, "batch:1");
        assert_eq!(triples[1].triplet_id, "batch:3");
        assert!(triples[1].metadata.is_some());
    }

    #[test]
    fn bad_json_line_names_the_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"subject\": \"A\", \"relation\": \"r\", \"object\": \"B\"}\nnope\n",
        )
        .unwrap();
        match read_triples(&path) {
            Err(StoreError::Serialization { message }) => assert!(message.contains(":2:")),
            other => panic!("expected serialization error, got {other:?}"),
        }
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        write_atomic(&path, b"old").unwrap();
        let bad = dir.path().join("missing-dir").join("doc.txt");
        assert!(write_atomic(&bad, b"new").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        write_atomic(&path, b"old").unwrap();
        // A directory in the way makes the final rename fail after the
        // temporary file has been written and synced.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();

        let err = write_atomic(&blocked, b"new").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(blocked.is_dir());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["blocked", "doc.txt"]);
    }
}
