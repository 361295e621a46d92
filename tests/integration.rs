//! End-to-end integration tests for ideagraph.
//!
//! These tests exercise the full pipeline from triple ingestion through
//! entity merging, subgraph mining, and the textual exchange form.

use ideagraph::engine::{Engine, EngineConfig};
use ideagraph::error::MineError;
use ideagraph::graph::{Direction, EdgeKey, Triple};
use ideagraph::mine::{
    self, extract_random_walk, extract_two_nodes, Method, MinerConfig, Strategy,
};
use ideagraph::subgraph::{parse_textual_representation, PathKind, SubgraphEdge};

fn test_engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn t(s: &str, r: &str, o: &str, id: &str) -> Triple {
    Triple::new(s, r, o, id)
}

/// A small longevity-flavoured graph with branches and a cycle.
fn pathway_engine() -> Engine {
    let mut engine = test_engine();
    let report = engine.ingest_all(&[
        t("caloric restriction", "activates", "AMPK", "p1:0"),
        t("AMPK", "inhibits", "mTOR", "p1:1"),
        t("mTOR", "suppresses", "autophagy", "p1:2"),
        t("rapamycin", "inhibits", "mTOR", "p2:0"),
        t("autophagy", "clears", "protein aggregates", "p2:1"),
        t("AMPK", "activates", "SIRT1", "p3:0"),
        t("SIRT1", "deacetylates", "FOXO3", "p3:1"),
        t("FOXO3", "promotes", "autophagy", "p3:2"),
        t("NAD+", "activates", "SIRT1", "p4:0"),
        t("protein aggregates", "impair", "AMPK", "p4:1"),
    ]);
    assert_eq!(report.rejected, 0);
    engine
}

#[test]
fn merge_scenario_and_two_node_path() {
    let mut engine = test_engine();
    engine
        .ingest(&t("Insulin receptor", "causes", "PI3K", "t1"))
        .unwrap();
    engine.ingest(&t("PI3K", "causes", "AKT", "t2")).unwrap();
    let merged = engine
        .ingest(&t("insulin-receptor", "causes", "PI3K", "t3"))
        .unwrap();

    assert!(merged.subject_merged);
    assert_eq!(merged.subject, "Insulin receptor");
    assert!(!merged.new_edge);
    assert_eq!(engine.node_count(), 3);
    assert_eq!(engine.edge_count(), 2);

    let edge = engine
        .get_edges("Insulin receptor", Direction::Outgoing)
        .unwrap()[0];
    assert_eq!(edge.sources.len(), 2);
    assert!(edge.sources.contains_triplet("t3"));
    let key = EdgeKey {
        source: "Insulin receptor".into(),
        target: "PI3K".into(),
        relation: "causes".into(),
    };
    assert_eq!(engine.graph().get_edge(&key), Some(edge));

    let sg = extract_two_nodes(engine.graph(), Some("Insulin receptor"), Some("AKT"), 5, 0)
        .unwrap();
    assert_eq!(sg.path_nodes(), ["Insulin receptor", "PI3K", "AKT"]);
    assert_eq!(sg.origin().path_kind, PathKind::Directed);
}

#[test]
fn empty_graph_cannot_be_walked() {
    let engine = test_engine();
    assert!(matches!(
        extract_random_walk(engine.graph(), None, 5, 5, 42),
        Err(MineError::EmptyGraph)
    ));
}

#[test]
fn walks_are_reproducible_and_bounded() {
    let engine = pathway_engine();
    for k in 1..6 {
        let a = extract_random_walk(engine.graph(), None, k, 50, 42).unwrap();
        let b = extract_random_walk(engine.graph(), None, k, 50, 42).unwrap();
        assert_eq!(a.path_nodes(), b.path_nodes());
        assert_eq!(a.path_edges(), b.path_edges());
        assert!(a.path_nodes().len() <= k + 1);
    }
}

#[test]
fn two_node_path_is_connected_by_its_edges() {
    let engine = pathway_engine();
    let sg = extract_two_nodes(
        engine.graph(),
        Some("caloric restriction"),
        Some("protein aggregates"),
        10,
        7,
    )
    .unwrap();
    let nodes = sg.path_nodes();
    assert_eq!(nodes[0], "caloric restriction");
    assert_eq!(nodes[nodes.len() - 1], "protein aggregates");
    assert_eq!(sg.path_edges().len(), nodes.len() - 1);
    for (pair, edge) in nodes.windows(2).zip(sg.path_edges()) {
        assert_eq!(edge.source, pair[0]);
        assert_eq!(edge.target, pair[1]);
        assert!(
            engine
                .get_edges(&pair[0], Direction::Outgoing)
                .unwrap()
                .iter()
                .any(|e| e.target == pair[1] && e.relation == edge.relation)
        );
    }
    // The SIRT1/FOXO3 branch is one hop longer.
    assert_eq!(
        nodes,
        [
            "caloric restriction",
            "AMPK",
            "mTOR",
            "autophagy",
            "protein aggregates"
        ]
    );
}

#[test]
fn text_form_round_trips_edge_multiset() {
    let engine = pathway_engine();
    for seed in 0..10 {
        let sg = extract_random_walk(engine.graph(), None, 4, 10, seed).unwrap();
        let mut parsed = parse_textual_representation(&sg.to_textual_representation()).unwrap();
        let mut expected: Vec<SubgraphEdge> = sg.edges().cloned().collect();
        parsed.sort();
        expected.sort();
        assert_eq!(parsed, expected);
    }
}

#[test]
fn subgraphs_are_snapshots_of_the_graph() {
    let mut engine = pathway_engine();
    let before = extract_two_nodes(engine.graph(), Some("NAD+"), Some("FOXO3"), 5, 0).unwrap();
    engine.ingest(&t("NAD+", "boosts", "FOXO3", "p5:0")).unwrap();
    let after = extract_two_nodes(engine.graph(), Some("NAD+"), Some("FOXO3"), 5, 0).unwrap();

    assert_eq!(before.path_nodes(), ["NAD+", "SIRT1", "FOXO3"]);
    assert_eq!(after.path_nodes(), ["NAD+", "FOXO3"]);
    assert_eq!(before.graph_stats().edge_count + 1, after.graph_stats().edge_count);
}

#[test]
fn strategy_dispatch_matches_direct_calls() {
    let engine = pathway_engine();
    let config = MinerConfig::default();
    let walk = mine::extract(
        engine.graph(),
        &Strategy::RandomWalk {
            seed: Some("AMPK".into()),
            max_steps: 3,
            max_nodes: 10,
        },
        &config,
        5,
    )
    .unwrap();
    assert_eq!(
        walk,
        extract_random_walk(engine.graph(), Some("AMPK"), 3, 10, 5).unwrap()
    );
    assert_eq!(walk.origin().method, Method::RandomWalk);

    let config = MinerConfig {
        method: Method::TwoNodes,
        max_nodes: 6,
        ..Default::default()
    };
    let strategy = config.strategy(Some("rapamycin".into()), Some("autophagy".into()));
    let path = mine::extract(engine.graph(), &strategy, &config, 0).unwrap();
    assert_eq!(path.path_nodes(), ["rapamycin", "mTOR", "autophagy"]);
    assert_eq!(path.origin().method, Method::TwoNodes);
}

#[test]
fn unreachable_targets_use_undirected_fallback() {
    let engine = pathway_engine();
    // Nothing points back to rapamycin.
    let sg = extract_two_nodes(engine.graph(), Some("AMPK"), Some("rapamycin"), 5, 0).unwrap();
    assert_eq!(sg.origin().path_kind, PathKind::Undirected);
    assert_eq!(sg.path_nodes(), ["AMPK", "mTOR", "rapamycin"]);
}

#[test]
fn prompt_embeds_the_graph() {
    let engine = pathway_engine();
    let sg = extract_two_nodes(engine.graph(), Some("NAD+"), Some("FOXO3"), 5, 0).unwrap();
    let prompt = sg.analysis_prompt();
    assert!(prompt.contains("\"NAD+\" and \"FOXO3\""));
    assert!(prompt.contains("(NAD+)-[:activates]->(SIRT1)"));
}
