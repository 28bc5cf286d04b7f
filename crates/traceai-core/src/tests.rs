//! Cross-module integration-style unit tests for traceai-core: exercise the
//! builder and query engine together over realistic fixtures rather than
//! one module in isolation.

use traceai_core::*;

use crate::test_utils::sample_etl_pipeline;

#[test]
fn ingest_then_trace_lineage_end_to_end() {
    let mut builder = GraphBuilder::new();
    let parsed = sample_etl_pipeline();
    let report = builder.add_document(parsed).unwrap();
    assert!(report.nodes_added >= 4);

    let downstream = trace_lineage(
        builder.graph(),
        "staging.customer_raw",
        LineageDirection::Downstream,
        DEFAULT_MAX_DEPTH,
        DEFAULT_MAX_VISITED,
    )
    .unwrap();
    assert!(downstream.downstream.iter().any(|n| n.name == "dw.dim_customer"));

    let impact = analyze_impact(builder.graph(), "staging.customer_raw").unwrap();
    assert_eq!(impact.readers, vec!["DFT Load Customers".to_string()]);
}

#[test]
fn reingest_same_document_does_not_duplicate_interned_entities() {
    let mut builder = GraphBuilder::new();
    builder.add_document(sample_etl_pipeline()).unwrap();
    let before = stats(builder.graph());
    builder.add_document(sample_etl_pipeline()).unwrap();
    let after = stats(builder.graph());
    assert_eq!(before.node_count, after.node_count);
    assert_eq!(before.edge_count, after.edge_count);
}

#[test]
fn snapshot_round_trip_preserves_query_results() {
    let mut builder = GraphBuilder::new();
    builder.add_document(sample_etl_pipeline()).unwrap();
    let json = persist::to_json(builder.graph()).unwrap();
    let (restored, _header) = persist::from_json(&json).unwrap();

    let before = stats(builder.graph());
    let after = stats(&restored);
    assert_eq!(before.node_count, after.node_count);
    assert_eq!(before.edge_count, after.edge_count);
}

#[test]
fn find_nodes_filters_by_kind() {
    let mut builder = GraphBuilder::new();
    builder.add_document(sample_etl_pipeline()).unwrap();
    let entities = find_nodes(builder.graph(), Some("DataEntity"), None, None);
    assert_eq!(entities.len(), 2);
    let components = find_nodes(builder.graph(), Some("Component"), None, None);
    assert_eq!(components.len(), 1);
}
