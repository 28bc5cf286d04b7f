//! The typed multigraph (§3, §4.4): a `petgraph::StableDiGraph` wrapper
//! indexed by stable content-derived `NodeId`/`EdgeId` rather than by
//! petgraph's own indices, so identity survives node removal and
//! reinsertion across re-ingests.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::model::{
    Component, DataEntity, DataSource, DependencyKind, Document, EdgeId, NodeId, Parameter,
};

/// A node value. Every IR entity kind is folded into this one node shape
/// so the graph stays a single homogeneous multigraph (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphNode {
    Document(Document),
    Component(Component),
    DataSource(DataSource),
    DataEntity(DataEntity),
    Parameter(Parameter),
}

impl GraphNode {
    pub fn id(&self) -> &NodeId {
        match self {
            GraphNode::Document(d) => &d.id,
            GraphNode::Component(c) => &c.id,
            GraphNode::DataSource(s) => &s.id,
            GraphNode::DataEntity(e) => &e.id,
            GraphNode::Parameter(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GraphNode::Document(d) => &d.name,
            GraphNode::Component(c) => &c.name,
            GraphNode::DataSource(s) => &s.name,
            GraphNode::DataEntity(e) => &e.name,
            GraphNode::Parameter(p) => &p.name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            GraphNode::Document(_) => "Document",
            GraphNode::Component(_) => "Component",
            GraphNode::DataSource(_) => "DataSource",
            GraphNode::DataEntity(_) => "DataEntity",
            GraphNode::Parameter(_) => "Parameter",
        }
    }

    /// The text surface used by the vector index (§4.6).
    pub fn text_surface(&self) -> String {
        match self {
            GraphNode::Document(d) => format!("{} {}", d.name, d.kind.as_str()),
            GraphNode::Component(c) => format!(
                "{} {} {}",
                c.name,
                c.component_type,
                c.description.as_deref().unwrap_or("")
            ),
            GraphNode::DataSource(s) => s.locator.clone(),
            GraphNode::DataEntity(e) => match &e.schema {
                Some(schema) => format!("{}.{}", schema, e.name),
                None => e.name.clone(),
            },
            GraphNode::Parameter(p) => format!("{} {}", p.name, p.data_type),
        }
    }
}

/// A directed edge value (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: DependencyKind,
    pub owner_document: Option<NodeId>,
    pub properties: HashMap<String, String>,
    pub confidence: f32,
}

/// The code/ETL graph: a directed multigraph with stable string identity.
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
    /// Reference counts for interned DataSource/DataEntity nodes (§3 invariants).
    refcounts: HashMap<NodeId, u32>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            edge_index: HashMap::new(),
            refcounts: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index.get(id).and_then(|idx| self.inner.node_weight(*idx))
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edge_index
            .get(id)
            .and_then(|idx| self.inner.edge_weight(*idx))
    }

    /// Insert a node, or bump its refcount if its id is already interned.
    /// Returns `true` if a new node was created.
    pub fn upsert_node(&mut self, node: GraphNode) -> bool {
        let id = node.id().clone();
        if let Some(&idx) = self.index.get(&id) {
            *self.inner.node_weight_mut(idx).expect("index/graph out of sync") = node;
            *self.refcounts.entry(id).or_insert(0) += 1;
            false
        } else {
            let idx = self.inner.add_node(node);
            self.index.insert(id.clone(), idx);
            self.refcounts.insert(id, 1);
            true
        }
    }

    /// Add an edge; both endpoints must already exist.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Option<EdgeId> {
        let from_idx = *self.index.get(&edge.from)?;
        let to_idx = *self.index.get(&edge.to)?;
        let id = edge.id.clone();
        let idx = self.inner.add_edge(from_idx, to_idx, edge);
        self.edge_index.insert(id.clone(), idx);
        Some(id)
    }

    /// Decrement a node's refcount; remove it (and its incident edges) once
    /// the count reaches zero. Returns `true` if the node was removed.
    pub fn release_node(&mut self, id: &NodeId) -> bool {
        let Some(count) = self.refcounts.get_mut(id) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return false;
        }
        self.refcounts.remove(id);
        if let Some(idx) = self.index.remove(id) {
            for edge_ref in self.inner.edges_directed(idx, Direction::Outgoing) {
                self.edge_index.remove(&edge_ref.weight().id);
            }
            for edge_ref in self.inner.edges_directed(idx, Direction::Incoming) {
                self.edge_index.remove(&edge_ref.weight().id);
            }
            self.inner.remove_node(idx);
            true
        } else {
            false
        }
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<GraphEdge> {
        let idx = self.edge_index.remove(id)?;
        self.inner.remove_edge(idx)
    }

    pub fn refcount(&self, id: &NodeId) -> u32 {
        self.refcounts.get(id).copied().unwrap_or(0)
    }

    /// Insert a node carrying a specific refcount, bypassing the usual
    /// bump-on-upsert rule. Used by snapshot restore (`persist.rs`), where
    /// the counts are the serialized truth rather than something to increment.
    pub fn insert_with_refcount(&mut self, node: GraphNode, refcount: u32) {
        let id = node.id().clone();
        let idx = self.inner.add_node(node);
        self.index.insert(id.clone(), idx);
        self.refcounts.insert(id, refcount);
    }

    pub fn refcounts(&self) -> &HashMap<NodeId, u32> {
        &self.refcounts
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_indices().filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner.edge_indices().filter_map(move |idx| self.inner.edge_weight(idx))
    }

    pub fn edges_from(&self, source: &NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.index.get(source).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .filter_map(move |e| self.inner.edge_weight(e.id()))
        })
    }

    pub fn edges_to(&self, target: &NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.index.get(target).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Incoming)
                .filter_map(move |e| self.inner.edge_weight(e.id()))
        })
    }

    /// Outgoing edges of a given kind from `source`.
    pub fn edges_from_of_kind(
        &self,
        source: &NodeId,
        kind: DependencyKind,
    ) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.index.get(source).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .filter_map(move |e| self.inner.edge_weight(e.id()))
                .filter(move |e| e.kind == kind)
        })
    }

    /// Incoming edges of a given kind to `target`.
    pub fn edges_to_of_kind(
        &self,
        target: &NodeId,
        kind: DependencyKind,
    ) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.index.get(target).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Incoming)
                .filter_map(move |e| self.inner.edge_weight(e.id()))
                .filter(move |e| e.kind == kind)
        })
    }

    pub fn nodes_of_document(&self, document_id: &NodeId) -> Vec<NodeId> {
        self.all_nodes()
            .filter(|n| match n {
                GraphNode::Component(c) => &c.document_id == document_id,
                GraphNode::Parameter(p) => &p.document_id == document_id,
                _ => false,
            })
            .map(|n| n.id().clone())
            .collect()
    }

    pub fn edges_owned_by(&self, document_id: &NodeId) -> Vec<EdgeId> {
        self.all_edges()
            .filter(|e| e.owner_document.as_ref() == Some(document_id))
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn by_kind(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for n in self.all_nodes() {
            *counts.entry(n.kind_label()).or_insert(0) += 1;
        }
        counts
    }

    pub fn find_node_ids_by_name_substring(&self, pattern: &str) -> HashSet<NodeId> {
        let pattern = pattern.to_lowercase();
        self.all_nodes()
            .filter(|n| n.name().to_lowercase().contains(&pattern))
            .map(|n| n.id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataEntity;
    use std::collections::HashMap as Map;

    fn entity(id: &str, name: &str) -> GraphNode {
        GraphNode::DataEntity(DataEntity {
            id: NodeId(id.to_string()),
            name: name.to_string(),
            entity_type: "table".to_string(),
            columns: Vec::new(),
            schema: None,
        })
    }

    #[test]
    fn upsert_is_idempotent_identity() {
        let mut g = Graph::new();
        assert!(g.upsert_node(entity("e1", "Customer")));
        assert!(!g.upsert_node(entity("e1", "Customer")));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.refcount(&NodeId("e1".into())), 2);
    }

    #[test]
    fn release_node_removes_at_zero_refcount() {
        let mut g = Graph::new();
        g.upsert_node(entity("e1", "Customer"));
        assert!(!g.release_node(&NodeId("e1".into())));
        assert!(g.contains_node(&NodeId("e1".into())));
        g.upsert_node(entity("e1", "Customer"));
        assert!(g.release_node(&NodeId("e1".into())));
        assert!(!g.release_node(&NodeId("e1".into())));
        assert!(!g.contains_node(&NodeId("e1".into())));
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let mut g = Graph::new();
        g.upsert_node(entity("e1", "A"));
        let edge = GraphEdge {
            id: EdgeId("x".into()),
            from: NodeId("e1".into()),
            to: NodeId("missing".into()),
            kind: DependencyKind::ReadsFrom,
            owner_document: None,
            properties: Map::new(),
            confidence: 1.0,
        };
        assert!(g.add_edge(edge).is_none());
    }
}
