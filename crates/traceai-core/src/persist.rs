//! Graph snapshot persistence (§6): a JSON dump of the full graph plus a
//! small header recording the schema version and the content hash of every
//! ingested document, so a forward-incompatible snapshot is rejected
//! cleanly instead of partially loading.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::graph::{Graph, GraphEdge, GraphNode};
use crate::model::NodeId;

/// Bumped whenever the on-disk shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub schema_version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// document source_path -> content_hash, for a caller to decide whether
    /// a re-ingest is needed before trusting this snapshot (§6).
    pub document_hashes: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    header: SnapshotHeader,
    nodes: Vec<NodeEntry>,
    edges: Vec<GraphEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeEntry {
    node: GraphNode,
    refcount: u32,
}

fn build_header(graph: &Graph) -> SnapshotHeader {
    let mut document_hashes = HashMap::new();
    for node in graph.all_nodes() {
        if let GraphNode::Document(doc) = node {
            document_hashes.insert(doc.source_path.clone(), doc.content_hash.clone());
        }
    }
    SnapshotHeader {
        schema_version: SCHEMA_VERSION,
        created_at: chrono::Utc::now(),
        document_hashes,
    }
}

pub fn to_json(graph: &Graph) -> CoreResult<String> {
    let nodes = graph
        .all_nodes()
        .map(|n| NodeEntry { node: n.clone(), refcount: graph.refcount(n.id()) })
        .collect();
    let edges = graph.all_edges().cloned().collect();
    let file = SnapshotFile { header: build_header(graph), nodes, edges };
    serde_json::to_string_pretty(&file)
        .map_err(|e| CoreError::Internal(format!("serializing snapshot: {e}")))
}

pub fn from_json(data: &str) -> CoreResult<(Graph, SnapshotHeader)> {
    let file: SnapshotFile = serde_json::from_str(data)
        .map_err(|e| CoreError::Internal(format!("reading snapshot: {e}")))?;
    if file.header.schema_version > SCHEMA_VERSION {
        return Err(CoreError::InvalidArgument(format!(
            "snapshot schema version {} is newer than supported {}",
            file.header.schema_version, SCHEMA_VERSION
        )));
    }

    let mut graph = Graph::new();
    for entry in file.nodes {
        graph.insert_with_refcount(entry.node, entry.refcount);
    }
    for edge in file.edges {
        graph.add_edge(edge);
    }
    Ok((graph, file.header))
}

pub fn save_to_dir(graph: &Graph, persist_dir: &Path) -> CoreResult<std::path::PathBuf> {
    std::fs::create_dir_all(persist_dir)
        .map_err(|e| CoreError::Internal(format!("creating persist dir: {e}")))?;
    let path = persist_dir.join("graph.json");
    let data = to_json(graph)?;
    std::fs::write(&path, data).map_err(|e| CoreError::Internal(format!("writing snapshot: {e}")))?;
    Ok(path)
}

pub fn load_from_dir(persist_dir: &Path) -> CoreResult<(Graph, SnapshotHeader)> {
    let path = persist_dir.join("graph.json");
    let data = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::Internal(format!("reading snapshot file {}: {e}", path.display())))?;
    from_json(&data)
}
