//! Engine facade: top-level API for building the knowledge graph.
//!
//! The `Engine` owns the graph, the similarity index and the entity
//! resolution state. It is the only mutator of all three: `ingest` and
//! `annotate` take `&mut self`, so a single writer is enforced by the
//! borrow checker while any number of readers share `&Engine` or
//! [`Engine::graph`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embed::{
    cosine_similarity, normalize_label, CachedEmbedder, Embedder, HashingEmbedder,
};
use crate::error::{ConfigError, GraphError, IdeaResult, StoreError};
use crate::graph::index::{GraphResult, KnowledgeGraph};
use crate::graph::{Direction, Edge, Node, Triple};
use crate::similarity::SimilarityIndex;
use crate::store::Snapshot;

/// How entity labels are matched against existing nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Cosine similarity of embeddings against the configured threshold.
    #[default]
    Embedding,
    /// Case- and whitespace-insensitive label equality.
    ExactMatch,
    /// Never merge; every distinct label is its own node.
    None,
}

impl std::fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedding => write!(f, "embedding"),
            Self::ExactMatch => write!(f, "exact_match"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Text embedded for an entity under [`ResolutionPolicy::Embedding`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionContext {
    /// The bare label.
    #[default]
    Label,
    /// `"{label} {relation}"`, using the relation of the mentioning triple.
    LabelWithRelation,
}

/// Configuration for the knowledge graph engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum cosine similarity for two labels to denote the same entity.
    /// Higher means fewer merges.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub resolution: ResolutionPolicy,
    #[serde(default)]
    pub resolution_context: ResolutionContext,
    /// Vector length of the built-in hashing embedder.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Cap on the number of triples `ingest_all` considers.
    #[serde(default)]
    pub max_items: Option<usize>,
}

fn default_similarity_threshold() -> f32 {
    0.85
}
fn default_embedding_dimension() -> usize {
    crate::embed::hashing::DEFAULT_DIMENSION
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            resolution: ResolutionPolicy::default(),
            resolution_context: ResolutionContext::default(),
            embedding_dimension: default_embedding_dimension(),
            max_items: None,
        }
    }
}

impl EngineConfig {
    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.similarity_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "similarity_threshold must be within [-1, 1], got {}",
                    self.similarity_threshold
                ),
            });
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Invalid {
                message: "embedding_dimension must be > 0".into(),
            });
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::Invalid {
                message: "max_items must be > 0 when set".into(),
            });
        }
        Ok(())
    }
}

/// The embedder an engine uses when none is supplied.
pub fn default_embedder(config: &EngineConfig) -> Box<dyn Embedder> {
    Box::new(CachedEmbedder::new(HashingEmbedder::new(
        config.embedding_dimension,
    )))
}

/// Where a label would land if ingested now.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A node with exactly this label exists.
    Existing { label: String },
    /// An equivalent node exists under a different label.
    Merged {
        label: String,
        /// Cosine similarity, when the match came from embeddings.
        similarity: Option<f32>,
    },
    /// No match: a new node would be created.
    New,
}

impl Resolution {
    /// The canonical label of the matched node, if any.
    pub fn canonical(&self) -> Option<&str> {
        match self {
            Self::Existing { label } | Self::Merged { label, .. } => Some(label),
            Self::New => None,
        }
    }
}

/// A mention's resolution, plus its embedding when it would be indexed.
#[derive(Debug)]
struct Plan {
    resolution: Resolution,
    vector: Option<Vec<f32>>,
}

impl Plan {
    fn settled(resolution: Resolution) -> Self {
        Self {
            resolution,
            vector: None,
        }
    }
}

/// Outcome of ingesting one triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// Canonical subject label used.
    pub subject: String,
    /// Canonical object label used.
    pub object: String,
    /// Subject resolved to a node with a different label.
    pub subject_merged: bool,
    pub object_merged: bool,
    /// The (subject, object, relation) edge did not exist before.
    pub new_edge: bool,
}

/// Summary of a batch ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    pub rejected: usize,
    /// Triples beyond `max_items` that were not considered.
    pub skipped: usize,
    /// Subject or object resolutions onto a differently-labelled node.
    pub merges: usize,
    pub node_count: usize,
    pub edge_count: usize,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ingested {} triples ({} rejected, {} skipped, {} merges): {} nodes, {} edges",
            self.ingested,
            self.rejected,
            self.skipped,
            self.merges,
            self.node_count,
            self.edge_count
        )
    }
}

/// Knowledge graph engine: entity resolution plus the merged graph.
pub struct Engine {
    config: EngineConfig,
    graph: KnowledgeGraph,
    index: SimilarityIndex,
    /// Embedding key -> canonical label.
    canonical_by_key: HashMap<String, String>,
    /// Normalized label -> canonical label, for exact-match resolution.
    canonical_by_norm: HashMap<String, String>,
}

impl Engine {
    /// Create an empty engine using the built-in hashing embedder.
    pub fn new(config: EngineConfig) -> IdeaResult<Self> {
        let embedder = default_embedder(&config);
        Self::with_embedder(config, embedder)
    }

    /// Create an empty engine over a caller-supplied embedder.
    pub fn with_embedder(config: EngineConfig, embedder: Box<dyn Embedder>) -> IdeaResult<Self> {
        config.validate()?;
        tracing::info!(
            threshold = config.similarity_threshold,
            resolution = %config.resolution,
            dim = embedder.dimension(),
            "initializing ideagraph engine"
        );
        Ok(Self {
            config,
            graph: KnowledgeGraph::new(),
            index: SimilarityIndex::new(embedder),
            canonical_by_key: HashMap::new(),
            canonical_by_norm: HashMap::new(),
        })
    }

    /// Load a snapshot and rebuild resolution state from node labels.
    ///
    /// Labels are re-registered in creation order, so later ingests resolve
    /// exactly as they would have in the engine that wrote the snapshot.
    pub fn load(
        path: &Path,
        config: EngineConfig,
        embedder: Box<dyn Embedder>,
    ) -> IdeaResult<Self> {
        let graph = Snapshot::load(path)?.restore()?;
        let mut engine = Self::with_embedder(config, embedder)?;

        let labels: Vec<(String, Option<String>)> = graph
            .get_all_nodes()
            .map(|n| {
                let relation = n.sources.iter().next().map(|s| s.relation.clone());
                (n.label.clone(), relation)
            })
            .collect();
        engine.graph = graph;
        for (label, relation) in &labels {
            engine.register(label, relation.as_deref().unwrap_or_default())?;
        }

        tracing::info!(
            path = %path.display(),
            nodes = engine.graph.node_count(),
            edges = engine.graph.edge_count(),
            "loaded graph snapshot"
        );
        Ok(engine)
    }

    /// Atomically write the graph to `path`.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        Snapshot::capture(&self.graph)?.save(path)?;
        tracing::info!(
            path = %path.display(),
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "saved graph snapshot"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Ingest one triple, merging its entities into equivalent nodes.
    ///
    /// Both mentions are embedded and resolved before anything changes, so
    /// on error (including an embedder failure) the graph and the
    /// resolution state are untouched.
    pub fn ingest(&mut self, triple: &Triple) -> GraphResult<Ingested> {
        let t = triple.validated()?;

        let subject_plan = self.plan(&t.subject, &t.relation)?;
        let mut object_plan = self.plan(&t.object, &t.relation)?;
        if subject_plan.resolution == Resolution::New {
            object_plan =
                self.replan_against_new(&t.subject, &subject_plan, &t.object, object_plan)?;
        }

        let (subject, subject_merged) = self.apply(&t.subject, &t.relation, subject_plan);
        let (object, object_merged) = self.apply(&t.object, &t.relation, object_plan);

        let source = t.source_ref();
        let new_edge = self
            .graph
            .upsert_edge(&subject, &object, &t.relation, source.clone())?;
        for label in [&subject, &object] {
            if let Some(node) = self.graph.node_mut(label) {
                node.sources.insert(source.clone());
            }
        }

        Ok(Ingested {
            subject,
            object,
            subject_merged,
            object_merged,
            new_edge,
        })
    }

    /// Ingest many triples, skipping (and logging) the ones that fail.
    pub fn ingest_all(&mut self, triples: &[Triple]) -> IngestReport {
        let limit = self.config.max_items.unwrap_or(triples.len()).min(triples.len());
        let (batch, rest) = triples.split_at(limit);
        let mut report = IngestReport {
            skipped: rest.len(),
            ..Default::default()
        };

        self.prefetch(batch);

        for triple in batch {
            match self.ingest(triple) {
                Ok(done) => {
                    report.ingested += 1;
                    report.merges +=
                        usize::from(done.subject_merged) + usize::from(done.object_merged);
                }
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(
                        triplet_id = %triple.triplet_id,
                        error = %e,
                        "rejected triple"
                    );
                }
            }
        }

        report.node_count = self.graph.node_count();
        report.edge_count = self.graph.edge_count();
        tracing::info!(
            ingested = report.ingested,
            rejected = report.rejected,
            skipped = report.skipped,
            merges = report.merges,
            nodes = report.node_count,
            edges = report.edge_count,
            "batch ingest complete"
        );
        report
    }

    /// Warm the embedder with every label in `batch` on the rayon pool.
    fn prefetch(&self, batch: &[Triple]) {
        if self.config.resolution != ResolutionPolicy::Embedding || batch.is_empty() {
            return;
        }
        let keys: Vec<String> = batch
            .iter()
            .filter_map(|t| t.validated().ok())
            .flat_map(|t| {
                [
                    self.embedding_key(&t.subject, &t.relation),
                    self.embedding_key(&t.object, &t.relation),
                ]
            })
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        if let Err(e) = self.index.prefetch(&refs) {
            tracing::debug!(error = %e, "embedding prefetch incomplete");
        }
    }

    /// Set a free-form attribute on a node, returning the previous value.
    pub fn annotate(
        &mut self,
        label: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> GraphResult<Option<serde_json::Value>> {
        let node = self.graph.node_mut(label).ok_or_else(|| GraphError::NotFound {
            label: label.to_owned(),
        })?;
        Ok(node.attrs.insert(key.into(), value))
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn embedding_key(&self, label: &str, relation: &str) -> String {
        match self.config.resolution_context {
            ResolutionContext::LabelWithRelation if !relation.is_empty() => {
                format!("{label} {relation}")
            }
            _ => label.to_owned(),
        }
    }

    /// Which node `label` resolves to, without changing anything.
    pub fn resolve(&self, label: &str) -> GraphResult<Resolution> {
        self.resolve_with(label, None)
    }

    /// Like [`Engine::resolve`], for a mention under `relation`.
    ///
    /// The relation only matters with [`ResolutionContext::LabelWithRelation`].
    pub fn resolve_with(&self, label: &str, relation: Option<&str>) -> GraphResult<Resolution> {
        Ok(self.plan(label.trim(), relation.unwrap_or_default())?.resolution)
    }

    /// Resolve a mention against the current state without mutating it.
    fn plan(&self, label: &str, relation: &str) -> GraphResult<Plan> {
        if self.graph.has_node(label) {
            return Ok(Plan::settled(Resolution::Existing {
                label: label.to_owned(),
            }));
        }
        match self.config.resolution {
            ResolutionPolicy::None => Ok(Plan::settled(Resolution::New)),
            ResolutionPolicy::ExactMatch => Ok(Plan::settled(
                self.canonical_by_norm
                    .get(&normalize_label(label))
                    .map_or(Resolution::New, |canonical| Resolution::Merged {
                        label: canonical.clone(),
                        similarity: None,
                    }),
            )),
            ResolutionPolicy::Embedding => {
                let vector = self.index.embed(&self.embedding_key(label, relation))?;
                let resolution = self
                    .index
                    .best_match_for(&vector, self.config.similarity_threshold)?
                    .and_then(|c| {
                        self.canonical_by_key
                            .get(&c.key)
                            .map(|canonical| Resolution::Merged {
                                label: canonical.clone(),
                                similarity: Some(c.similarity),
                            })
                    })
                    .unwrap_or(Resolution::New);
                Ok(Plan {
                    resolution,
                    vector: Some(vector),
                })
            }
        }
    }

    /// Revise the object's plan for a subject that will be created first.
    ///
    /// The new subject is the latest node, so it only wins over an existing
    /// match when strictly more similar.
    fn replan_against_new(
        &self,
        subject: &str,
        subject_plan: &Plan,
        object: &str,
        object_plan: Plan,
    ) -> GraphResult<Plan> {
        if object == subject {
            return Ok(Plan::settled(Resolution::Existing {
                label: subject.to_owned(),
            }));
        }
        let merged = |similarity| Resolution::Merged {
            label: subject.to_owned(),
            similarity,
        };
        let resolution = match (self.config.resolution, &object_plan.resolution) {
            (_, Resolution::Existing { .. }) | (ResolutionPolicy::None, _) => None,
            (ResolutionPolicy::ExactMatch, Resolution::New) => {
                (normalize_label(object) == normalize_label(subject)).then(|| merged(None))
            }
            (ResolutionPolicy::ExactMatch, Resolution::Merged { .. }) => None,
            (ResolutionPolicy::Embedding, current) => {
                match (&subject_plan.vector, &object_plan.vector) {
                    (Some(s), Some(o)) => {
                        let similarity = cosine_similarity(o, s)?;
                        let beats_current = match current {
                            Resolution::Merged {
                                similarity: Some(existing),
                                ..
                            } => similarity > *existing,
                            _ => true,
                        };
                        (similarity >= self.config.similarity_threshold && beats_current)
                            .then(|| merged(Some(similarity)))
                    }
                    _ => None,
                }
            }
        };
        Ok(match resolution {
            Some(resolution) => Plan {
                resolution,
                ..object_plan
            },
            None => object_plan,
        })
    }

    /// Carry out a plan. Returns the canonical label and whether it differs
    /// from `label`.
    fn apply(&mut self, label: &str, relation: &str, plan: Plan) -> (String, bool) {
        match plan.resolution {
            Resolution::Existing { label } => (label, false),
            Resolution::Merged {
                label: canonical,
                similarity,
            } => {
                tracing::debug!(
                    surface = label,
                    canonical = %canonical,
                    similarity = ?similarity,
                    "merged entity"
                );
                if let Some(node) = self.graph.node_mut(&canonical) {
                    node.add_alias(label);
                }
                (canonical, true)
            }
            Resolution::New => {
                self.graph.ensure_node(label);
                self.register_embedded(label, relation, plan.vector);
                (label.to_owned(), false)
            }
        }
    }

    /// Make a node findable by resolution, embedding it first.
    fn register(&mut self, label: &str, relation: &str) -> GraphResult<()> {
        let vector = match self.config.resolution {
            ResolutionPolicy::Embedding => {
                Some(self.index.embed(&self.embedding_key(label, relation))?)
            }
            _ => None,
        };
        self.register_embedded(label, relation, vector);
        Ok(())
    }

    fn register_embedded(&mut self, label: &str, relation: &str, vector: Option<Vec<f32>>) {
        match self.config.resolution {
            ResolutionPolicy::None => {}
            ResolutionPolicy::ExactMatch => {
                self.canonical_by_norm
                    .entry(normalize_label(label))
                    .or_insert_with(|| label.to_owned());
            }
            ResolutionPolicy::Embedding => {
                if let Some(vector) = vector {
                    let key = self.embedding_key(label, relation);
                    self.index.insert_embedded(&key, vector);
                    self.canonical_by_key
                        .entry(key)
                        .or_insert_with(|| label.to_owned());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The merged graph, for mining and read-only traversal.
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_node(&self, label: &str) -> GraphResult<&Node> {
        self.graph.get_node(label)
    }

    pub fn get_edges(&self, label: &str, direction: Direction) -> GraphResult<Vec<&Edge>> {
        self.graph.get_edges(label, direction)
    }

    pub fn get_node_attrs(&self, label: &str) -> GraphResult<&BTreeMap<String, serde_json::Value>> {
        self.graph.get_node_attrs(label)
    }

    pub fn get_all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.get_all_nodes()
    }

    pub fn get_all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.get_all_edges()
    }

    pub fn has_node(&self, label: &str) -> bool {
        self.graph.has_node(label)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Distinct relation labels in the graph.
    pub fn relations(&self) -> BTreeSet<&str> {
        self.graph.relations()
    }

    /// Get engine info/statistics.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            relation_count: self.graph.relations().len(),
            indexed_labels: self.index.len(),
            similarity_threshold: self.config.similarity_threshold,
            resolution: self.config.resolution,
            dimension: self.index.dimension(),
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub node_count: usize,
    pub edge_count: usize,
    pub relation_count: usize,
    pub indexed_labels: usize,
    pub similarity_threshold: f32,
    pub resolution: ResolutionPolicy,
    pub dimension: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ideagraph engine info")?;
        writeln!(f, "  nodes:        {}", self.node_count)?;
        writeln!(f, "  edges:        {}", self.edge_count)?;
        writeln!(f, "  relations:    {}", self.relation_count)?;
        writeln!(f, "  indexed:      {}", self.indexed_labels)?;
        writeln!(f, "  threshold:    {}", self.similarity_threshold)?;
        writeln!(f, "  resolution:   {}", self.resolution)?;
        writeln!(f, "  dimension:    {}", self.dimension)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("knowledge_graph", &self.graph)
            .finish()
    }
}
