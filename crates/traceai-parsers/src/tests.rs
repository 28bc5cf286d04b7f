//! Coordinator-level tests exercising discovery, parallel parse, and serial
//! commit across multiple formats in one directory tree.

use std::sync::Arc;

use tempfile::tempdir;
use traceai_core::GraphBuilder;

use crate::coordinator::{CancellationToken, Coordinator, IngestConfig, NoopVectorSink};
use crate::registry::default_registry;

#[tokio::test]
async fn ingests_mixed_format_directory_and_cross_links_jcl_exec() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("job.jcl"),
        "//CUSTJOB JOB (ACCT),'CUSTOMER LOAD'\n//STEP1   EXEC PGM=CUSTEXTR\n//OUTFILE DD DSN=STAGE.CUSTOMER.EXTRACT,DISP=(NEW,CATLG,DELETE)\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("custextr.cbl"),
        "       IDENTIFICATION DIVISION.\n       PROGRAM-ID. CUSTEXTR.\n       PROCEDURE DIVISION.\n       MAIN-PARA.\n           CONTINUE.\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("lineage.csv"),
        "source,target\nstaging.customer_raw,dw.dim_customer\n",
    )
    .unwrap();

    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, IngestConfig::default());
    let mut builder = GraphBuilder::new();

    let report = coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files_discovered, 3);
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.files_parsed_ok, 3);
    // JOB's EXEC PGM=CUSTEXTR resolves once CUSTEXTR.cbl (program CUSTEXTR) commits.
    assert_eq!(builder.pending_reference_count(), 0);
    assert!(builder.graph().node_count() > 0);
}

#[tokio::test]
async fn reingesting_same_tree_is_idempotent() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("lineage.csv"),
        "source,target\nstaging.customer_raw,dw.dim_customer\n",
    )
    .unwrap();

    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, IngestConfig::default());
    let mut builder = GraphBuilder::new();

    coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();
    let node_count_after_first = builder.graph().node_count();
    let edge_count_after_first = builder.graph().edge_count();

    coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(builder.graph().node_count(), node_count_after_first);
    assert_eq!(builder.graph().edge_count(), edge_count_after_first);
}

#[tokio::test]
async fn unsupported_files_are_skipped_not_failed() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("readme.txt"), "not a pipeline artifact").unwrap();
    std::fs::write(
        dir.path().join("lineage.csv"),
        "source,target\nstaging.a,dw.b\n",
    )
    .unwrap();

    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, IngestConfig::default());
    let mut builder = GraphBuilder::new();

    let report = coordinator
        .run_full_index(dir.path(), &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_skipped_unsupported, 1);
    assert_eq!(report.files_parsed_ok, 1);
}
