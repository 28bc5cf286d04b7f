//! Axum router for the tool surface (§4.8 `[AMBIENT]`): one route per
//! operation, permissive CORS, a `/api/health` endpoint, state attached
//! last.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers::{
    analyze_impact, find_dependencies, graph_query, graph_stats, health_check, semantic_search,
    trace_lineage,
};
use crate::state::ServerState;

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/graph_query", get(graph_query))
        .route("/api/trace_lineage", get(trace_lineage))
        .route("/api/analyze_impact", get(analyze_impact))
        .route("/api/find_dependencies", get(find_dependencies))
        .route("/api/semantic_search", post(semantic_search))
        .route("/api/graph_stats", get(graph_stats))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use traceai_core::GraphBuilder;
    use traceai_vector::{IndexConfig, LocalEmbeddingProvider, VectorIndex};

    #[test]
    fn router_builds() {
        let state = ServerState::new(GraphBuilder::new(), VectorIndex::new(IndexConfig::default()), Box::new(LocalEmbeddingProvider::new()));
        let _router = create_router(state);
    }
}
