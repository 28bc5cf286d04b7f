//! REST handlers for the six tool operations (§4.8): extract state and
//! query params, call the pure function in `tools.rs`, wrap in `Json`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::error::ToolError;
use crate::schema::{
    AnalyzeImpactParams, ErrorBody, FindDependenciesParams, GraphQueryParams,
    SemanticSearchParams, TraceLineageParams,
};
use crate::state::ServerState;
use crate::tools;

impl IntoResponse for ToolError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorBody { kind: self.kind(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

pub async fn graph_query(State(state): State<Arc<ServerState>>, Query(params): Query<GraphQueryParams>) -> impl IntoResponse {
    let builder = state.builder.read().await;
    Json(tools::graph_query(
        builder.graph(),
        params.kind.as_deref(),
        params.name_substring.as_deref(),
        params.limit,
    ))
}

pub async fn trace_lineage(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<TraceLineageParams>,
) -> Result<impl IntoResponse, ToolError> {
    let builder = state.builder.read().await;
    let result = tools::trace_lineage(builder.graph(), &params.entity_name, params.direction, params.max_depth)?;
    Ok(Json(result))
}

pub async fn analyze_impact(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<AnalyzeImpactParams>,
) -> Result<impl IntoResponse, ToolError> {
    let builder = state.builder.read().await;
    let result = tools::analyze_impact(builder.graph(), &params.entity_name)?;
    Ok(Json(result))
}

pub async fn find_dependencies(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<FindDependenciesParams>,
) -> Result<impl IntoResponse, ToolError> {
    let builder = state.builder.read().await;
    let result = tools::find_dependencies(builder.graph(), &params.component_id, params.direction, params.max_depth)?;
    Ok(Json(result))
}

pub async fn semantic_search(
    State(state): State<Arc<ServerState>>,
    Json(params): Json<SemanticSearchParams>,
) -> Result<impl IntoResponse, ToolError> {
    let result = tools::semantic_search(
        &state.vector_index,
        state.embedding_provider.as_ref(),
        &params.text,
        params.k,
        params.filter,
    )
    .await?;
    Ok(Json(result))
}

pub async fn graph_stats(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let builder = state.builder.read().await;
    Json(tools::graph_stats(builder.graph()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let _response = health_check().await;
    }
}
