//! Typed request/response schemas for the six named tool operations
//! (§4.8). Shared by the direct-call surface (`tools.rs`) and the HTTP
//! surface (`handlers.rs`) so both expose the exact same shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQueryParams {
    pub kind: Option<String>,
    pub name_substring: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub kind: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceLineageParams {
    pub entity_name: String,
    #[serde(default)]
    pub direction: DirectionParam,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionParam {
    Upstream,
    Downstream,
    #[default]
    Both,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeImpactParams {
    pub entity_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindDependenciesParams {
    pub component_id: String,
    #[serde(default)]
    pub direction: DependencyDirectionParam,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyDirectionParam {
    #[default]
    Downstream,
    Upstream,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSearchParams {
    pub text: String,
    pub k: usize,
    #[serde(default)]
    pub filter: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticResult {
    pub id: String,
    pub score: f32,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}
