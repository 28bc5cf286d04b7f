//! End-to-end tests driving the ingestion coordinator, query engine, and
//! vector index together against on-disk fixture trees, covering the
//! concrete scenarios S1-S6.

use std::sync::Arc;

use tempfile::tempdir;

use traceai_core::{persist, DependencyDirection, GraphBuilder, LineageDirection};
use traceai_parsers::{default_registry, CancellationToken, Coordinator, IngestConfig, NoopVectorSink};
use traceai_vector::{IndexConfig, LocalEmbeddingProvider, VectorIndex};

async fn ingest_dir(dir: &std::path::Path) -> (GraphBuilder, traceai_parsers::IngestReport) {
    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, IngestConfig::default());
    let mut builder = GraphBuilder::new();
    let report = coordinator
        .run_full_index(dir, &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();
    (builder, report)
}

/// S1 — SSIS impact: two readers and one writer of `Customer`, readers
/// sorted lexicographically.
#[tokio::test]
async fn s1_ssis_impact() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("load_customers.dtsx"),
        r#"<?xml version="1.0"?>
<DTS:Executable xmlns:DTS="www.microsoft.com/SqlServer/Dts" DTS:ObjectName="LoadCustomers">
  <DTS:Executable DTS:ObjectName="ExtractCustomers" DTS:ExecutableType="Microsoft.ExecuteSQLTask">
    <SqlTaskData SqlStatementSource="SELECT * FROM dbo.Customer"/>
  </DTS:Executable>
  <DTS:Executable DTS:ObjectName="AggregateSales" DTS:ExecutableType="Microsoft.ExecuteSQLTask">
    <SqlTaskData SqlStatementSource="SELECT region, SUM(amount) FROM dbo.Customer GROUP BY region"/>
  </DTS:Executable>
  <DTS:Executable DTS:ObjectName="MergeToWarehouse" DTS:ExecutableType="Microsoft.ExecuteSQLTask">
    <SqlTaskData SqlStatementSource="INSERT INTO dbo.Customer (id) VALUES (1)"/>
  </DTS:Executable>
</DTS:Executable>
"#,
    )
    .unwrap();

    let (builder, report) = ingest_dir(dir.path()).await;
    assert_eq!(report.files_failed, 0);

    let result = traceai_core::analyze_impact(builder.graph(), "Customer").unwrap();
    assert_eq!(result.readers, vec!["AggregateSales".to_string(), "ExtractCustomers".to_string()]);
    assert_eq!(result.writers, vec!["MergeToWarehouse".to_string()]);
    assert_eq!(result.total, 3);
}

/// S2 — Cross-format lineage: a COBOL program and a JCL job referencing it
/// by `EXEC PGM=`, resolved as a deferred reference across documents.
#[tokio::test]
async fn s2_cross_format_lineage() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("cust001.cbl"),
        r#"
       IDENTIFICATION DIVISION.
       PROGRAM-ID. CUST001.
       ENVIRONMENT DIVISION.
       FILE-CONTROL.
           SELECT CUSTOMER-FILE ASSIGN TO CUSTOMER.INPUT.MASTER.
           SELECT CUSTMAST ASSIGN TO CUSTMAST.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01 CUSTOMER-RECORD.
       PROCEDURE DIVISION.
       MAIN-PARA.
           READ CUSTOMER-FILE.
           WRITE CUSTMAST.
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("custjob.jcl"),
        "//CUSTJOB JOB (ACCT),'CUSTOMER LOAD'\n//STEP1   EXEC PGM=CUST001\n//INFILE  DD DSN=CUSTOMER.INPUT.MASTER,DISP=SHR\n//OUTFILE DD DSN=CUSTMAST,DISP=(NEW,CATLG,DELETE)\n",
    )
    .unwrap();

    let (builder, report) = ingest_dir(dir.path()).await;
    assert_eq!(report.files_failed, 0);
    assert_eq!(builder.pending_reference_count(), 0, "JCL's EXEC PGM=CUST001 must resolve once CUST001.cbl commits");

    let result = traceai_core::trace_lineage(
        builder.graph(),
        "CUSTMAST",
        LineageDirection::Upstream,
        5,
        traceai_core::DEFAULT_MAX_VISITED,
    )
    .unwrap();
    let names: Vec<&str> = result.upstream.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"CUSTOMER-FILE"));
    assert!(names.contains(&"CUSTOMER.INPUT.MASTER"));
}

/// S3 — Idempotent re-ingest: running the same tree twice reports no
/// further changes the second time.
#[tokio::test]
async fn s3_idempotent_reingest() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        std::fs::write(
            dir.path().join(format!("lineage_{i}.csv")),
            format!("source,target\nstaging.raw_{i},dw.dim_{i}\n"),
        )
        .unwrap();
    }

    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, IngestConfig::default());
    let mut builder = GraphBuilder::new();

    coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();
    let (nodes_first, edges_first) = (builder.graph().node_count(), builder.graph().edge_count());

    let second = coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.commit.nodes_added, 0);
    assert_eq!(second.commit.edges_added, 0);
    assert_eq!(builder.graph().node_count(), nodes_first);
    assert_eq!(builder.graph().edge_count(), edges_first);
}

/// S4 — Partial ingest: malformed inputs fail without blocking the rest of
/// the tree.
#[tokio::test]
async fn s4_partial_ingest_reports_failures_but_completes() {
    let dir = tempdir().unwrap();
    for i in 0..8 {
        std::fs::write(
            dir.path().join(format!("lineage_{i}.csv")),
            format!("source,target\nstaging.raw_{i},dw.dim_{i}\n"),
        )
        .unwrap();
    }
    // `.dtsx` files are admitted by extension but fail to parse as XML.
    std::fs::write(dir.path().join("broken_a.dtsx"), "not xml at all, no Executable marker").unwrap();
    std::fs::write(dir.path().join("broken_b.dtsx"), "also not xml, no Executable marker").unwrap();

    let (builder, report) = ingest_dir(dir.path()).await;

    assert_eq!(report.files_discovered, 10);
    assert_eq!(report.files_skipped_unsupported, 2, "both malformed .dtsx files fail validation and are skipped, not parsed");
    assert_eq!(report.files_parsed_ok, 8);
    assert!(builder.graph().node_count() > 0);
}

/// S5 — Cycle-safe traversal: a PRECEDES cycle A -> B -> C -> A doesn't
/// loop `component_dependencies` forever and each node appears once.
#[tokio::test]
async fn s5_cycle_safe_traversal() {
    use traceai_core::model::{Component, Dependency, DependencyKind, DependencyTarget, Document, DocumentKind};
    use traceai_core::NodeId;

    let mut builder = GraphBuilder::new();
    let doc = Document {
        id: NodeId::document("cycle.dtsx", "h1"),
        name: "Cycle".to_string(),
        kind: DocumentKind::Ssis,
        source_path: "cycle.dtsx".to_string(),
        content_hash: "h1".to_string(),
        parsed_at: chrono::Utc::now(),
        custom: Default::default(),
    };
    let a = Component {
        id: NodeId::component(&doc.id, "A"),
        document_id: doc.id.clone(),
        name: "A".to_string(),
        component_type: "task".to_string(),
        description: None,
        source_excerpt: None,
        parse_partial: false,
    };
    let b = Component { id: NodeId::component(&doc.id, "B"), name: "B".to_string(), ..a.clone() };
    let c = Component { id: NodeId::component(&doc.id, "C"), name: "C".to_string(), ..a.clone() };

    let parsed = traceai_core::ParsedDocument {
        document: doc,
        components: vec![a.clone(), b.clone(), c.clone()],
        data_sources: vec![],
        data_entities: vec![],
        parameters: vec![],
        dependencies: vec![
            Dependency { from_id: a.id.clone(), to_id: DependencyTarget::Id(b.id.clone()), kind: DependencyKind::Precedes, properties: Default::default(), confidence: 1.0 },
            Dependency { from_id: b.id.clone(), to_id: DependencyTarget::Id(c.id.clone()), kind: DependencyKind::Precedes, properties: Default::default(), confidence: 1.0 },
            Dependency { from_id: c.id.clone(), to_id: DependencyTarget::Id(a.id.clone()), kind: DependencyKind::Precedes, properties: Default::default(), confidence: 1.0 },
        ],
        warnings: vec![],
    };
    builder.add_document(parsed).unwrap();

    let deps = traceai_core::component_dependencies(builder.graph(), &a.id, DependencyDirection::Downstream, 10, traceai_core::DEFAULT_MAX_VISITED).unwrap();
    assert_eq!(deps.len(), 2);
    let mut sorted = deps.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["B".to_string(), "C".to_string()]);
}

/// S6 — Semantic/graph consistency: every id `semantic_search` returns must
/// resolve in the graph, and removing a document's exclusive nodes then
/// re-searching never surfaces them again.
#[tokio::test]
async fn s6_semantic_search_results_are_graph_consistent() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("lineage.csv"),
        "source,target\nstaging.customer_raw,dw.dim_customer\n",
    )
    .unwrap();

    let (mut builder, _report) = ingest_dir(dir.path()).await;

    let index = VectorIndex::new(IndexConfig::default());
    let provider = LocalEmbeddingProvider::new();
    let mut document_id = None;
    for node in builder.graph().all_nodes() {
        if matches!(node, traceai_core::GraphNode::Document(_)) {
            document_id = Some(node.id().clone());
        }
        index
            .upsert(node.id().clone(), &node.text_surface(), Default::default(), &provider)
            .await
            .unwrap();
    }

    let results = index.similarity_search(&provider_embed(&provider, "customer data").await, 10, None);
    for (id, _score, _metadata) in &results {
        assert!(builder.graph().contains_node(id), "semantic_search returned id {id:?} with no graph node");
    }

    if let Some(document_id) = document_id {
        let owned = builder.graph().nodes_of_document(&document_id);
        builder.remove_document(&document_id).unwrap();
        for id in &owned {
            if !builder.graph().contains_node(id) {
                index.delete(id).unwrap();
            }
        }
        let results_after = index.similarity_search(&provider_embed(&provider, "customer data").await, 10, None);
        for (id, _score, _metadata) in &results_after {
            assert!(builder.graph().contains_node(id), "post-removal search returned a dangling id {id:?}");
        }
    }
}

async fn provider_embed(provider: &LocalEmbeddingProvider, text: &str) -> Vec<f32> {
    use traceai_vector::EmbeddingProvider;
    provider.embed(text).await.unwrap()
}

/// Boundary: an empty tree ingests cleanly to an empty graph.
#[tokio::test]
async fn empty_tree_yields_empty_graph() {
    let dir = tempdir().unwrap();
    let (builder, report) = ingest_dir(dir.path()).await;
    assert_eq!(report.files_discovered, 0);
    assert_eq!(traceai_core::stats(builder.graph()).nodes, 0);
}

/// Boundary: persisting and reloading a graph snapshot round-trips stats.
#[tokio::test]
async fn persisted_snapshot_round_trips_stats() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("lineage.csv"),
        "source,target\nstaging.customer_raw,dw.dim_customer\n",
    )
    .unwrap();
    let (builder, _) = ingest_dir(dir.path()).await;

    let persist_dir = tempdir().unwrap();
    persist::save_to_dir(builder.graph(), persist_dir.path()).unwrap();
    let (loaded, _header) = persist::load_from_dir(persist_dir.path()).unwrap();

    assert_eq!(traceai_core::stats(&loaded).nodes, traceai_core::stats(builder.graph()).nodes);
}
