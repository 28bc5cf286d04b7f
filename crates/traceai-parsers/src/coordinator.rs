//! Ingestion coordinator (C7, §4.7): discover → admit → parse in parallel →
//! commit serially → resolve deferred references, with cooperative
//! cancellation and idempotent re-runs.
//!
//! Parse work is CPU-bound (XML/regex/CSV scanning), so each parse runs on
//! `tokio::task::spawn_blocking`, bounded by a `Semaphore` sized to
//! `max_concurrent_parsers` — one format-parser invocation per task, since
//! these parsers are plain `Send` values with no per-thread state to pin.
//! Results stream through a bounded `mpsc` channel to a single committer
//! task so the graph sees one writer, matching §5's single-writer model.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use globset::{Glob, GlobSetBuilder};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use traceai_core::{CommitReport, GraphBuilder, ParsedDocument, UnresolvedRef};

use crate::error::ParseError;
use crate::registry::ParserRegistry;

/// A sink the coordinator feeds newly committed documents' text surfaces
/// into for embedding/indexing (C6). Kept as a trait here, rather than a
/// direct dependency on the vector crate, so the parser crate doesn't need
/// to know how the index is implemented — only that commits and upserts
/// stay ordered (§5: "upserts are ordered after their corresponding graph
/// commit").
pub trait VectorSink: Send + Sync {
    fn upsert_document(&self, parsed: &ParsedDocument);
}

/// A sink that does nothing, for callers that only care about the graph.
pub struct NoopVectorSink;

impl VectorSink for NoopVectorSink {
    fn upsert_document(&self, _parsed: &ParsedDocument) {}
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_concurrent_parsers: usize,
    pub patterns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            max_concurrent_parsers: 10,
            patterns: vec!["**/*".to_string()],
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub files_discovered: usize,
    pub files_skipped_unsupported: usize,
    pub files_parsed_ok: usize,
    pub files_failed: usize,
    pub parse_errors: Vec<String>,
    pub commit: CommitReport,
    pub cancelled: bool,
    /// References left unresolved once this run finished (§4.7 step 5) —
    /// e.g. a JCL `EXEC PGM=X` or COBOL `CALL 'X'` whose target was never
    /// ingested.
    pub unresolved_references: Vec<UnresolvedRef>,
}

/// Cooperative cancellation handle shared between the caller and every
/// in-flight parse task (§5 "every long-running public call accepts a
/// cancellation token").
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Coordinator {
    registry: Arc<ParserRegistry>,
    config: IngestConfig,
}

impl Coordinator {
    pub fn new(registry: Arc<ParserRegistry>, config: IngestConfig) -> Self {
        Coordinator { registry, config }
    }

    /// Walk `root`, parse every admitted file in parallel, and commit
    /// results serially into `builder` (§4.7 steps 1-5).
    pub async fn run_full_index(
        &self,
        root: &Path,
        builder: &mut GraphBuilder,
        vector_sink: &dyn VectorSink,
        token: CancellationToken,
    ) -> Result<IngestReport, ParseError> {
        let mut report = IngestReport::default();

        let paths = discover(root, &self.config.patterns)?;
        report.files_discovered = paths.len();

        let mut admitted = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read(&path) {
                Ok(content) => {
                    if self.registry.is_supported(&path) && self.registry.validate(&path, &content) {
                        admitted.push((path, content));
                    } else {
                        report.files_skipped_unsupported += 1;
                    }
                }
                Err(e) => {
                    report.files_failed += 1;
                    report.parse_errors.push(format!("{}: read failed: {e}", path.display()));
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_parsers.max(1)));
        let (tx, mut rx) = mpsc::channel::<ParseOutcome>(2 * self.config.max_concurrent_parsers.max(1));

        let registry = Arc::clone(&self.registry);
        let spawn_token = token.clone();
        let producer = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(admitted.len());
            for (path, content) in admitted {
                if spawn_token.is_cancelled() {
                    break;
                }
                // Acquire the permit here, in the async producer, and move it
                // into the blocking task so it's held for the task's whole
                // lifetime and released on completion.
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                let registry = Arc::clone(&registry);
                let tx = tx.clone();
                let task_token = spawn_token.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    if task_token.is_cancelled() {
                        return;
                    }
                    let outcome = match registry.parser_for(&path) {
                        Some(parser) => match parser.parse(&path, &content) {
                            Ok(parsed) => ParseOutcome::Ok(path.clone(), parsed),
                            Err(e) => ParseOutcome::Err(path.clone(), e),
                        },
                        None => ParseOutcome::Err(
                            path.clone(),
                            ParseError::UnsupportedFormat(path.display().to_string()),
                        ),
                    };
                    let _ = tx.blocking_send(outcome);
                });
                handles.push(handle);
            }
            for handle in handles {
                let _ = handle.await;
            }
        });

        // Single committer: results stream in arrival order, not submission
        // order (§4.7 step 4). `add_document` already resolves any deferred
        // references waiting on the document it just committed, so by the
        // time the last result lands, resolution has effectively happened
        // incrementally — step 5 is just reading what's left over.
        while let Some(outcome) = rx.recv().await {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match outcome {
                ParseOutcome::Ok(path, parsed) => {
                    debug!(path = %path.display(), "committing parsed document");
                    // Upsert only after a successful commit, never before —
                    // §5 requires vector upserts ordered after their
                    // corresponding graph commit so semantic_search never
                    // returns a node id the graph doesn't have yet.
                    let for_sink = parsed.clone();
                    match builder.add_document(parsed) {
                        Ok(commit) => {
                            merge_commit(&mut report.commit, commit);
                            report.files_parsed_ok += 1;
                            vector_sink.upsert_document(&for_sink);
                        }
                        Err(e) => {
                            report.files_failed += 1;
                            report.parse_errors.push(format!("{}: commit failed: {e}", path.display()));
                        }
                    }
                }
                ParseOutcome::Err(path, err) => {
                    warn!(path = %path.display(), error = %err, "parse failed");
                    report.files_failed += 1;
                    report.parse_errors.push(format!("{}: {err}", path.display()));
                }
            }
        }

        let _ = producer.await;

        let unresolved = builder.resolve_deferred_references();
        if !unresolved.is_empty() {
            debug!(unresolved = unresolved.len(), "deferred references remain unresolved after this run");
        }
        report.unresolved_references = unresolved;

        Ok(report)
    }
}

enum ParseOutcome {
    Ok(PathBuf, ParsedDocument),
    Err(PathBuf, ParseError),
}

fn merge_commit(total: &mut CommitReport, commit: CommitReport) {
    total.nodes_added += commit.nodes_added;
    total.nodes_reused += commit.nodes_reused;
    total.edges_added += commit.edges_added;
    total.edges_deferred += commit.edges_deferred;
    total.warnings.extend(commit.warnings);
}

fn discover(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ParseError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ParseError::MalformedInput {
            path: pattern.clone(),
            detail: format!("invalid glob pattern: {e}"),
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| ParseError::MalformedInput {
        path: root.display().to_string(),
        detail: format!("invalid glob set: {e}"),
    })?;

    let mut seen = std::collections::HashSet::new();
    let mut paths = Vec::new();
    for entry in ignore::WalkBuilder::new(root).hidden(false).build() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.into_path();
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if !set.is_match(relative) {
            continue;
        }
        let canonical = path.canonicalize().unwrap_or(path.clone());
        if seen.insert(canonical.clone()) {
            paths.push(canonical);
        }
    }
    Ok(paths)
}
