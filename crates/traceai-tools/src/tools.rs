//! The six named tool operations (§4.8): pure functions over a graph
//! snapshot and, for semantic search, a vector index handle. No hidden
//! state beyond what's passed in.

use std::collections::BTreeMap;

use traceai_core::{
    analyze_impact as core_analyze_impact, component_dependencies, find_nodes, stats,
    trace_lineage as core_trace_lineage, DependencyDirection, Graph, GraphStats, ImpactResult,
    LineageDirection, LineageResult, NodeId, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VISITED,
};
use traceai_vector::{EmbeddingProvider, VectorIndex};

use crate::error::ToolResult;
use crate::schema::{
    DependencyDirectionParam, DirectionParam, NodeSummary, SemanticResult,
};

pub fn graph_query(graph: &Graph, kind: Option<&str>, name_substring: Option<&str>, limit: Option<usize>) -> Vec<NodeSummary> {
    find_nodes(graph, kind, name_substring, limit)
        .into_iter()
        .map(|n| NodeSummary { id: n.id().to_string(), kind: n.kind_label(), name: n.name().to_string() })
        .collect()
}

pub fn trace_lineage(graph: &Graph, entity_name: &str, direction: DirectionParam, max_depth: Option<usize>) -> ToolResult<LineageResult> {
    let direction = match direction {
        DirectionParam::Upstream => LineageDirection::Upstream,
        DirectionParam::Downstream => LineageDirection::Downstream,
        DirectionParam::Both => LineageDirection::Both,
    };
    core_trace_lineage(graph, entity_name, direction, max_depth.unwrap_or(DEFAULT_MAX_DEPTH), DEFAULT_MAX_VISITED)
        .map_err(Into::into)
}

pub fn analyze_impact(graph: &Graph, entity_name: &str) -> ToolResult<ImpactResult> {
    core_analyze_impact(graph, entity_name).map_err(Into::into)
}

pub fn find_dependencies(graph: &Graph, component_id: &str, direction: DependencyDirectionParam, max_depth: Option<usize>) -> ToolResult<Vec<String>> {
    let direction = match direction {
        DependencyDirectionParam::Downstream => DependencyDirection::Downstream,
        DependencyDirectionParam::Upstream => DependencyDirection::Upstream,
    };
    let id = NodeId(component_id.to_string());
    component_dependencies(graph, &id, direction, max_depth.unwrap_or(DEFAULT_MAX_DEPTH), DEFAULT_MAX_VISITED).map_err(Into::into)
}

pub async fn semantic_search(
    index: &VectorIndex,
    provider: &dyn EmbeddingProvider,
    text: &str,
    k: usize,
    filter: Option<BTreeMap<String, serde_json::Value>>,
) -> ToolResult<Vec<SemanticResult>> {
    let query_vector = provider.embed(text).await?;
    let results = index.similarity_search(&query_vector, k, filter.as_ref());
    Ok(results
        .into_iter()
        .map(|(id, score, metadata)| SemanticResult { id: id.to_string(), score, metadata })
        .collect())
}

pub fn graph_stats(graph: &Graph) -> GraphStats {
    stats(graph)
}
