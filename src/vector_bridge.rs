//! Bridges the parser crate's synchronous `VectorSink` trait to the
//! genuinely async `VectorIndex` (§5, §4.6): the coordinator's committer
//! task calls `upsert_document` synchronously per §5's single-writer loop,
//! so the sink can't `.await` inline without blocking that loop. Instead it
//! hands each committed document off over an unbounded channel to a
//! background task that does the actual embedding + upsert calls in
//! arrival order, preserving the "upsert after commit" ordering the
//! coordinator already guarantees on the sending side.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use traceai_core::{GraphNode, ParsedDocument};
use traceai_parsers::VectorSink;
use traceai_vector::{EmbeddingProvider, VectorIndex};

pub struct ChannelVectorSink {
    sender: mpsc::UnboundedSender<ParsedDocument>,
}

impl VectorSink for ChannelVectorSink {
    fn upsert_document(&self, parsed: &ParsedDocument) {
        if self.sender.send(parsed.clone()).is_err() {
            warn!("vector upsert worker is gone, dropping document for indexing");
        }
    }
}

/// Spawns the background worker and returns the sink plus a handle to await
/// once ingestion is done, draining any remaining buffered documents first.
pub fn spawn(index: Arc<VectorIndex>, provider: Arc<dyn EmbeddingProvider>) -> (ChannelVectorSink, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<ParsedDocument>();

    let handle = tokio::spawn(async move {
        while let Some(parsed) = receiver.recv().await {
            for node in parsed_document_nodes(&parsed) {
                let id = node.id().clone();
                let text = node.text_surface();
                let metadata = std::iter::once(("kind".to_string(), serde_json::Value::String(node.kind_label().to_string()))).collect();
                if let Err(e) = index.upsert(id.clone(), &text, metadata, provider.as_ref()).await {
                    warn!(node_id = %id.0, error = %e, "failed to index node for semantic search");
                }
            }
        }
    });

    (ChannelVectorSink { sender }, handle)
}

fn parsed_document_nodes(parsed: &ParsedDocument) -> Vec<GraphNode> {
    let mut nodes = Vec::with_capacity(1 + parsed.components.len() + parsed.data_sources.len() + parsed.data_entities.len() + parsed.parameters.len());
    nodes.push(GraphNode::Document(parsed.document.clone()));
    nodes.extend(parsed.components.iter().cloned().map(GraphNode::Component));
    nodes.extend(parsed.data_sources.iter().cloned().map(GraphNode::DataSource));
    nodes.extend(parsed.data_entities.iter().cloned().map(GraphNode::DataEntity));
    nodes.extend(parsed.parameters.iter().cloned().map(GraphNode::Parameter));
    nodes
}
