//! Shared server state (§4.8 `[AMBIENT]`): a single-writer graph builder
//! behind a lock, plus an independently thread-safe vector index and
//! embedding provider, matching §5's concurrency model exactly.

use std::sync::Arc;

use tokio::sync::RwLock;
use traceai_core::GraphBuilder;
use traceai_vector::{EmbeddingProvider, VectorIndex};

pub struct ServerState {
    pub builder: RwLock<GraphBuilder>,
    pub vector_index: VectorIndex,
    pub embedding_provider: Box<dyn EmbeddingProvider>,
}

impl ServerState {
    pub fn new(builder: GraphBuilder, vector_index: VectorIndex, embedding_provider: Box<dyn EmbeddingProvider>) -> Arc<Self> {
        Arc::new(ServerState { builder: RwLock::new(builder), vector_index, embedding_provider })
    }
}
