//! The graph builder (§4.4): the single writer that turns a `ParsedDocument`
//! into graph mutations. Owns the commit algorithm, interning, ref-counting,
//! and deferred cross-document reference resolution.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::graph::{Graph, GraphEdge, GraphNode};
use crate::model::{
    normalize_identifier, Component, DataEntity, DataSource, Dependency, DependencyKind,
    DependencyTarget, Document, EdgeId, NodeId, Parameter, ParsedDocument,
};

/// What committing one document did (§4.4, returned to the caller of `add_document`).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CommitReport {
    pub document_id: Option<String>,
    pub nodes_added: usize,
    pub nodes_reused: usize,
    pub edges_added: usize,
    pub edges_deferred: usize,
    pub warnings: Vec<String>,
}

/// A deferred reference still unresolved when the caller asks (§4.4
/// `resolve_deferred_references`, §4.7 step 5): the document it names hasn't
/// been ingested, so the edge never had a target to attach to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnresolvedRef {
    pub from: NodeId,
    pub referenced_name: String,
    pub kind: DependencyKind,
    pub owner_document: NodeId,
}

/// A deferred `CALLS`/reference edge waiting on a document that hasn't been
/// ingested yet, or whose target component couldn't be resolved by name at
/// commit time (§4.3, §4.4 step 5, §9).
#[derive(Debug, Clone)]
struct PendingReference {
    edge_id: EdgeId,
    from: NodeId,
    referenced_name: String,
    kind: DependencyKind,
    owner_document: NodeId,
    properties: HashMap<String, String>,
    confidence: f32,
}

/// Owns the graph and the single-writer commit/removal algorithm.
/// Wrapped in a `tokio::sync::RwLock` by callers for the single-writer,
/// multi-reader access pattern (§5).
#[derive(Default)]
pub struct GraphBuilder {
    graph: Graph,
    /// document_id -> node ids it directly owns (Components, Parameters) —
    /// used to garbage-collect on `remove_document` (§4.4 step 6).
    owned_nodes: HashMap<NodeId, Vec<NodeId>>,
    /// document_id -> interned (shared) node ids it referenced, so their
    /// refcounts can be released on removal.
    interned_refs: HashMap<NodeId, Vec<NodeId>>,
    /// Document name (normalized) -> document id, for deferred CALLS/EXEC
    /// resolution across documents (§9 "resolved by name").
    document_names: HashMap<String, NodeId>,
    /// Pending deferred references keyed by the normalized name they wait on.
    pending: HashMap<String, Vec<PendingReference>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Commit a parsed document (§4.4 steps 1-5):
    /// 1. normalize identifiers for interned nodes
    /// 2. upsert the Document and its owned Component/Parameter nodes
    /// 3. intern shared DataSource/DataEntity nodes, bumping refcounts
    /// 4. add edges whose target is already resolvable
    /// 5. record/resolve deferred references by document name
    pub fn add_document(&mut self, parsed: ParsedDocument) -> CoreResult<CommitReport> {
        let ParsedDocument {
            document,
            components,
            data_sources,
            data_entities,
            parameters,
            dependencies,
            warnings,
        } = parsed;

        let document_id = document.id.clone();
        let mut report = CommitReport {
            document_id: Some(document_id.to_string()),
            warnings: warnings.clone(),
            ..Default::default()
        };

        if self.graph.contains_node(&document_id) {
            debug!(document_id = %document_id, "re-ingesting document, removing prior state first");
            self.remove_document(&document_id)?;
        }

        let mut owned = Vec::new();
        let mut interned = Vec::new();

        self.graph.upsert_node(GraphNode::Document(document.clone()));
        owned.push(document_id.clone());
        report.nodes_added += 1;
        self.document_names
            .insert(normalize_identifier(&document.name), document_id.clone());

        for component in components {
            let id = component.id.clone();
            let is_new = self.graph.upsert_node(GraphNode::Component(component));
            owned.push(id.clone());
            if is_new {
                report.nodes_added += 1;
            } else {
                report.nodes_reused += 1;
            }
            // A Document owns its Components via an explicit CONTAINS edge
            // (§3 invariants), generated here rather than by each parser so
            // every format gets it uniformly.
            let edge = GraphEdge {
                id: EdgeId::new(&document_id, &id, DependencyKind::Contains),
                from: document_id.clone(),
                to: id,
                kind: DependencyKind::Contains,
                owner_document: Some(document_id.clone()),
                properties: HashMap::new(),
                confidence: 1.0,
            };
            if self.graph.add_edge(edge).is_some() {
                report.edges_added += 1;
            }
        }

        for parameter in parameters {
            let id = parameter.id.clone();
            let is_new = self.graph.upsert_node(GraphNode::Parameter(parameter));
            owned.push(id.clone());
            if is_new {
                report.nodes_added += 1;
            } else {
                report.nodes_reused += 1;
            }
        }

        for source in data_sources {
            let id = source.id.clone();
            let is_new = self.graph.upsert_node(GraphNode::DataSource(source));
            interned.push(id);
            if is_new {
                report.nodes_added += 1;
            } else {
                report.nodes_reused += 1;
            }
        }

        for entity in data_entities {
            let id = entity.id.clone();
            let is_new = self.graph.upsert_node(GraphNode::DataEntity(entity));
            interned.push(id);
            if is_new {
                report.nodes_added += 1;
            } else {
                report.nodes_reused += 1;
            }
        }

        for dependency in dependencies {
            self.commit_dependency(&document_id, dependency, &mut report)?;
        }

        self.owned_nodes.insert(document_id.clone(), owned);
        self.interned_refs.insert(document_id.clone(), interned);

        // A document we just ingested may satisfy references other documents
        // were waiting on (§9).
        self.resolve_pending_for(&document.name, &document_id, &mut report);

        Ok(report)
    }

    fn commit_dependency(
        &mut self,
        owner_document: &NodeId,
        dependency: Dependency,
        report: &mut CommitReport,
    ) -> CoreResult<()> {
        let Dependency { from_id, to_id, kind, properties, confidence } = dependency;
        if !self.graph.contains_node(&from_id) {
            return Err(CoreError::Internal(format!(
                "dependency source {from_id} not present in its own document's commit batch"
            )));
        }

        match to_id {
            DependencyTarget::Id(to) => {
                if self.graph.contains_node(&to) {
                    let edge_id = EdgeId::new(&from_id, &to, kind);
                    let edge = GraphEdge {
                        id: edge_id.clone(),
                        from: from_id,
                        to,
                        kind,
                        owner_document: Some(owner_document.clone()),
                        properties,
                        confidence,
                    };
                    if self.graph.add_edge(edge).is_some() {
                        report.edges_added += 1;
                    }
                } else {
                    warn!(target = %to, "dependency target not yet present, deferring by id as a name wait is not applicable");
                    report.edges_deferred += 1;
                }
            }
            DependencyTarget::DeferredDocumentName(name) => {
                let normalized = normalize_identifier(&name);
                if let Some(target_doc) = self.document_names.get(&normalized).cloned() {
                    let edge_id = EdgeId::new(&from_id, &target_doc, kind);
                    let edge = GraphEdge {
                        id: edge_id,
                        from: from_id,
                        to: target_doc,
                        kind,
                        owner_document: Some(owner_document.clone()),
                        properties,
                        confidence,
                    };
                    if self.graph.add_edge(edge).is_some() {
                        report.edges_added += 1;
                    }
                } else {
                    let edge_id_seed = format!("{}->{}:{}", from_id, normalized, kind.as_str());
                    self.pending.entry(normalized.clone()).or_default().push(PendingReference {
                        edge_id: EdgeId(format!("pending:{edge_id_seed}")),
                        from: from_id,
                        referenced_name: normalized,
                        kind,
                        owner_document: owner_document.clone(),
                        properties,
                        confidence,
                    });
                    report.edges_deferred += 1;
                }
            }
        }
        Ok(())
    }

    fn resolve_pending_for(
        &mut self,
        document_name: &str,
        document_id: &NodeId,
        report: &mut CommitReport,
    ) {
        let normalized = normalize_identifier(document_name);
        let Some(waiters) = self.pending.remove(&normalized) else {
            return;
        };
        for waiter in waiters {
            let edge_id = EdgeId::new(&waiter.from, document_id, waiter.kind);
            let edge = GraphEdge {
                id: edge_id,
                from: waiter.from,
                to: document_id.clone(),
                kind: waiter.kind,
                owner_document: Some(waiter.owner_document),
                properties: waiter.properties,
                confidence: waiter.confidence,
            };
            if self.graph.add_edge(edge).is_some() {
                report.edges_added += 1;
                report.edges_deferred = report.edges_deferred.saturating_sub(1);
            }
            let _ = waiter.edge_id;
            let _ = waiter.referenced_name;
        }
    }

    /// Remove a document and everything it owns exclusively (§4.4 step 6):
    /// drop its Component/Parameter nodes outright, release refcounts on
    /// interned DataSource/DataEntity nodes, and drop edges it owned.
    pub fn remove_document(&mut self, document_id: &NodeId) -> CoreResult<()> {
        if !self.graph.contains_node(document_id) {
            return Err(CoreError::UnknownEntity(document_id.to_string()));
        }

        for edge_id in self.graph.edges_owned_by(document_id) {
            self.graph.remove_edge(&edge_id);
        }

        if let Some(owned) = self.owned_nodes.remove(document_id) {
            for node_id in owned {
                if node_id != *document_id {
                    self.graph.release_node(&node_id);
                }
            }
        }
        if let Some(interned) = self.interned_refs.remove(document_id) {
            for node_id in interned {
                self.graph.release_node(&node_id);
            }
        }

        if let Some(GraphNode::Document(doc)) = self.graph.node(document_id).cloned() {
            self.document_names.remove(&normalize_identifier(&doc.name));
        }
        self.graph.release_node(document_id);

        self.pending.retain(|_, waiters| {
            waiters.retain(|w| w.owner_document != *document_id);
            !waiters.is_empty()
        });

        Ok(())
    }

    pub fn pending_reference_count(&self) -> usize {
        self.pending.values().map(|v| v.len()).sum()
    }

    /// Surfaces every reference still waiting on a document name that was
    /// never ingested (§4.4 `resolve_deferred_references`), deterministically
    /// ordered so a caller can report them (§4.7 step 5). Resolution itself
    /// already happens incrementally as each document commits; this just
    /// reads what's left over once a run is done.
    pub fn resolve_deferred_references(&self) -> Vec<UnresolvedRef> {
        let mut out: Vec<UnresolvedRef> = self
            .pending
            .values()
            .flatten()
            .map(|p| UnresolvedRef {
                from: p.from.clone(),
                referenced_name: p.referenced_name.clone(),
                kind: p.kind,
                owner_document: p.owner_document.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            (&a.owner_document, &a.from, &a.referenced_name).cmp(&(&b.owner_document, &b.from, &b.referenced_name))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataSourceKind, DocumentKind};
    use std::collections::HashMap as Map;

    fn doc(name: &str, path: &str) -> Document {
        Document {
            id: NodeId::document(path, name),
            name: name.to_string(),
            kind: DocumentKind::Cobol,
            source_path: path.to_string(),
            content_hash: name.to_string(),
            parsed_at: chrono::Utc::now(),
            custom: Map::new(),
        }
    }

    #[test]
    fn commits_document_and_components() {
        let mut builder = GraphBuilder::new();
        let d = doc("PAYROLL", "/jobs/payroll.cbl");
        let comp = Component {
            id: NodeId::component(&d.id, "MAIN-PARA"),
            document_id: d.id.clone(),
            name: "MAIN-PARA".to_string(),
            component_type: "paragraph".to_string(),
            description: None,
            source_excerpt: None,
            parse_partial: false,
        };
        let mut parsed = ParsedDocument::empty(d.clone());
        parsed.components.push(comp);

        let report = builder.add_document(parsed).unwrap();
        assert_eq!(report.nodes_added, 2);
        assert!(builder.graph().contains_node(&d.id));
    }

    #[test]
    fn reingest_is_idempotent() {
        let mut builder = GraphBuilder::new();
        let d = doc("PAYROLL", "/jobs/payroll.cbl");
        let parsed1 = ParsedDocument::empty(d.clone());
        builder.add_document(parsed1).unwrap();
        let parsed2 = ParsedDocument::empty(d.clone());
        builder.add_document(parsed2).unwrap();
        assert_eq!(builder.graph().node_count(), 1);
    }

    #[test]
    fn deferred_reference_resolves_when_target_arrives() {
        let mut builder = GraphBuilder::new();
        let caller = doc("JOBA", "/jobs/joba.jcl");
        let callee = doc("JOBB", "/jobs/jobb.jcl");

        let dep = Dependency {
            from_id: caller.id.clone(),
            to_id: DependencyTarget::DeferredDocumentName("JOBB".to_string()),
            kind: DependencyKind::Calls,
            properties: Map::new(),
            confidence: 1.0,
        };
        let mut parsed = ParsedDocument::empty(caller.clone());
        parsed.dependencies.push(dep);
        let report = builder.add_document(parsed).unwrap();
        assert_eq!(report.edges_deferred, 1);
        assert_eq!(builder.pending_reference_count(), 1);

        let report2 = builder.add_document(ParsedDocument::empty(callee.clone())).unwrap();
        assert_eq!(report2.edges_added, 1);
        assert_eq!(builder.pending_reference_count(), 0);
        assert_eq!(builder.graph().edge_count(), 1);
    }

    #[test]
    fn remove_document_releases_interned_nodes() {
        let mut builder = GraphBuilder::new();
        let d = doc("LOAD", "/jobs/load.jcl");
        let source = DataSource {
            id: NodeId::data_source(DataSourceKind::Db, "prod/customers"),
            name: "customers".to_string(),
            kind: DataSourceKind::Db,
            locator: "prod/customers".to_string(),
            properties: Map::new(),
        };
        let mut parsed = ParsedDocument::empty(d.clone());
        parsed.data_sources.push(source.clone());
        builder.add_document(parsed).unwrap();
        assert!(builder.graph().contains_node(&source.id));

        builder.remove_document(&d.id).unwrap();
        assert!(!builder.graph().contains_node(&source.id));
        assert!(!builder.graph().contains_node(&d.id));
    }

    #[test]
    fn remove_unknown_document_errors() {
        let mut builder = GraphBuilder::new();
        let err = builder.remove_document(&NodeId("missing".into())).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntity(_)));
    }
}
