//! TraceAI Core — the IR model, graph storage, builder, query engine, and
//! persistence for the ETL-intelligence knowledge graph.

pub mod builder;
pub mod error;
pub mod graph;
pub mod model;
pub mod persist;
pub mod query;
pub mod snapshot;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
pub mod tests;

pub use builder::{CommitReport, GraphBuilder, UnresolvedRef};
pub use error::{CoreError, CoreResult};
pub use graph::{Graph, GraphEdge, GraphNode};
pub use model::{
    normalize_identifier, split_schema, Component, DataEntity, DataSource, DataSourceKind,
    Dependency, DependencyKind, DependencyTarget, Document, DocumentKind, EdgeId, NodeId,
    Parameter, ParsedDocument,
};
pub use query::{
    analyze_impact, component_dependencies, find_by_name, find_nodes, paths_between, stats,
    trace_lineage, DependencyDirection, GraphStats, ImpactResult, LineageDirection, LineageResult,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_VISITED,
};
pub use snapshot::Snapshot;
