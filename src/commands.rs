//! Subcommand implementations (§6): each function maps one CLI verb onto a
//! handful of `traceai-core`/`traceai-parsers`/`traceai-tools` calls and
//! translates the result into one of the exit codes §6 defines.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use traceai_core::{persist, GraphBuilder};
use traceai_parsers::{default_registry, CancellationToken, Coordinator, NoopVectorSink};
use traceai_tools::schema::DirectionParam;
use traceai_tools::tools;
use traceai_vector::{EmbeddingProvider, LocalEmbeddingProvider, RemoteEmbeddingProvider, VectorIndex, VectorResult};

use crate::config::{AppConfig, EmbeddingProviderChoice};
use crate::vector_bridge;

/// Exit codes per §6.
pub const EXIT_OK: i32 = 0;
pub const EXIT_INVALID_ARGS: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;
pub const EXIT_PARTIAL_INGEST: i32 = 4;

fn build_embedding_provider(config: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    match &config.embedding.provider {
        EmbeddingProviderChoice::Local => Arc::new(LocalEmbeddingProvider::with_dimensions(config.embedding.dimensions)),
        EmbeddingProviderChoice::Remote { base_url, model } => Arc::new(RemoteEmbeddingProvider::new(
            base_url.clone(),
            model.clone(),
            config.embedding.dimensions,
            None,
        )),
    }
}

pub async fn ingest(root: &Path, config: &AppConfig, patterns: Option<Vec<String>>) -> anyhow::Result<i32> {
    let mut ingest_config = config.ingest.clone();
    if let Some(patterns) = patterns {
        ingest_config.patterns = patterns;
    }

    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, ingest_config);
    let mut builder = GraphBuilder::new();

    let vector_index = Arc::new(VectorIndex::new(config.hnsw));
    let provider = build_embedding_provider(config);
    let (sink, worker) = vector_bridge::spawn(Arc::clone(&vector_index), provider);

    let report = coordinator
        .run_full_index(root, &mut builder, &sink, CancellationToken::new())
        .await
        .context("ingestion failed")?;

    drop(sink);
    worker.await.context("vector indexing worker panicked")?;

    persist::save_to_dir(builder.graph(), &config.persist_dir).context("saving graph snapshot")?;
    vector_index.save(&config.persist_dir).context("saving vector index")?;

    info!(
        files_discovered = report.files_discovered,
        files_parsed_ok = report.files_parsed_ok,
        files_failed = report.files_failed,
        nodes_added = report.commit.nodes_added,
        edges_added = report.commit.edges_added,
        "ingestion complete"
    );
    for error in &report.parse_errors {
        tracing::warn!(%error, "ingest error");
    }
    for unresolved in &report.unresolved_references {
        tracing::warn!(
            from = %unresolved.from,
            referenced_name = %unresolved.referenced_name,
            kind = unresolved.kind.as_str(),
            "reference left unresolved"
        );
    }

    if report.files_failed > 0 {
        Ok(EXIT_PARTIAL_INGEST)
    } else {
        Ok(EXIT_OK)
    }
}

fn load_graph(config: &AppConfig) -> anyhow::Result<traceai_core::Graph> {
    let (graph, _header) = persist::load_from_dir(&config.persist_dir)
        .context("no ingested graph found; run `traceai ingest <dir>` first")?;
    Ok(graph)
}

pub fn stats(config: &AppConfig) -> anyhow::Result<i32> {
    let graph = load_graph(config)?;
    let stats = tools::graph_stats(&graph);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(EXIT_OK)
}

pub fn trace(config: &AppConfig, entity: &str, direction: DirectionParam, max_depth: Option<usize>) -> anyhow::Result<i32> {
    let graph = load_graph(config)?;
    match tools::trace_lineage(&graph, entity, direction, max_depth) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(EXIT_OK)
        }
        Err(e) => report_tool_error(e),
    }
}

pub fn impact(config: &AppConfig, entity: &str) -> anyhow::Result<i32> {
    let graph = load_graph(config)?;
    match tools::analyze_impact(&graph, entity) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(EXIT_OK)
        }
        Err(e) => report_tool_error(e),
    }
}

pub async fn search(config: &AppConfig, text: &str, k: usize) -> anyhow::Result<i32> {
    if !VectorIndex::persisted_exists(&config.persist_dir) {
        eprintln!("no vector index found; run `traceai ingest <dir>` first");
        return Ok(EXIT_INVALID_ARGS);
    }
    let index = VectorIndex::load(&config.persist_dir, config.hnsw).context("loading vector index")?;
    let provider = build_embedding_provider(config);
    let results = tools::semantic_search(&index, provider.as_ref(), text, k, None).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(EXIT_OK)
}

pub async fn serve(root: &Path, config: &AppConfig) -> anyhow::Result<i32> {
    let registry = Arc::new(default_registry());
    let coordinator = Coordinator::new(registry, config.ingest.clone());
    let mut builder = GraphBuilder::new();

    let report = coordinator
        .run_full_index(root, &mut builder, &NoopVectorSink, CancellationToken::new())
        .await
        .context("initial ingestion failed")?;
    info!(files_parsed_ok = report.files_parsed_ok, files_failed = report.files_failed, "serve: indexed workspace");

    let vector_index = if VectorIndex::persisted_exists(&config.persist_dir) {
        VectorIndex::load(&config.persist_dir, config.hnsw).context("loading vector index")?
    } else {
        VectorIndex::new(config.hnsw)
    };
    let provider = build_embedding_provider(config);

    let state = traceai_tools::ServerState::new(builder, vector_index, Box::new(SharedProvider(provider)));
    let router = traceai_tools::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("binding server address")?;
    info!(%addr, "serving tool surface");
    axum::serve(listener, router).await.context("server error")?;
    Ok(EXIT_OK)
}

/// `ServerState` owns a boxed provider; this adapts the `Arc<dyn
/// EmbeddingProvider>` shared with the CLI paths to that shape.
struct SharedProvider(Arc<dyn EmbeddingProvider>);

#[async_trait::async_trait]
impl EmbeddingProvider for SharedProvider {
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        self.0.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

fn report_tool_error(e: traceai_tools::ToolError) -> anyhow::Result<i32> {
    match &e {
        traceai_tools::ToolError::UnknownEntity(msg) => {
            eprintln!("not found: {msg}");
            Ok(EXIT_NOT_FOUND)
        }
        traceai_tools::ToolError::InvalidArgument(msg) => {
            eprintln!("invalid argument: {msg}");
            Ok(EXIT_INVALID_ARGS)
        }
        _ => Err(e.into()),
    }
}
