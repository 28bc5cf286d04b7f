//! Canonical IR entities (§3, §4.1): Document, Component, DataSource,
//! DataEntity, Parameter, Dependency, and the `ParsedDocument` aggregate
//! parsers hand to the graph builder.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable, content-derived node identifier. Re-parsing the same file, or
/// interning the same normalized locator/name from two different
/// documents, yields the same id — see §3 invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Hash arbitrary parts into a stable hex id prefixed by `kind` so ids
    /// stay legible in logs and snapshots (e.g. `document:3f9a...`).
    fn from_parts(kind: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        NodeId(format!("{kind}:{:x}", digest).chars().take(kind.len() + 1 + 16).collect())
    }

    pub fn document(path: &str, content_hash: &str) -> Self {
        Self::from_parts("document", &[path, content_hash])
    }

    pub fn component(document_id: &NodeId, local_name: &str) -> Self {
        NodeId(format!("{}/{}", document_id.0, local_name))
    }

    pub fn data_source(kind: DataSourceKind, normalized_locator: &str) -> Self {
        Self::from_parts("datasource", &[kind.as_str(), normalized_locator])
    }

    pub fn data_entity(schema: Option<&str>, normalized_name: &str) -> Self {
        Self::from_parts("dataentity", &[schema.unwrap_or(""), normalized_name])
    }

    pub fn parameter(document_id: &NodeId, name: &str) -> Self {
        NodeId(format!("{}/param/{}", document_id.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable edge identifier: hash of (from, to, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(from: &NodeId, to: &NodeId, kind: DependencyKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(from.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(to.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_str().as_bytes());
        let digest = hasher.finalize();
        EdgeId(format!("edge:{:x}", digest).chars().take(24).collect())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six source artifact kinds TraceAI's parsers accept (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Ssis,
    Cobol,
    Jcl,
    JsonConfig,
    Excel,
    CsvLineage,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Ssis => "SSIS",
            DocumentKind::Cobol => "COBOL",
            DocumentKind::Jcl => "JCL",
            DocumentKind::JsonConfig => "JSON_CONFIG",
            DocumentKind::Excel => "EXCEL",
            DocumentKind::CsvLineage => "CSV_LINEAGE",
        }
    }
}

/// A source artifact after parsing (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: NodeId,
    pub name: String,
    pub kind: DocumentKind,
    pub source_path: String,
    pub content_hash: String,
    pub parsed_at: chrono::DateTime<chrono::Utc>,
    pub custom: HashMap<String, String>,
}

/// A unit of work inside a `Document` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: NodeId,
    pub document_id: NodeId,
    pub name: String,
    pub component_type: String,
    pub description: Option<String>,
    pub source_excerpt: Option<String>,
    /// Set when this component's extraction was incomplete (§4.3, parse_partial).
    pub parse_partial: bool,
}

/// A connection/endpoint kind closed over the supported artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSourceKind {
    Db,
    File,
    Dataset,
    Ftp,
    Http,
    Unknown,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::Db => "db",
            DataSourceKind::File => "file",
            DataSourceKind::Dataset => "dataset",
            DataSourceKind::Ftp => "ftp",
            DataSourceKind::Http => "http",
            DataSourceKind::Unknown => "unknown",
        }
    }
}

/// A connection/endpoint (§3). Interned across documents by `(kind, locator)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: NodeId,
    pub name: String,
    pub kind: DataSourceKind,
    pub locator: String,
    pub properties: HashMap<String, String>,
}

/// A logical data container — table, record, sheet, range, dataset (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEntity {
    pub id: NodeId,
    pub name: String,
    pub entity_type: String,
    pub columns: Vec<String>,
    pub schema: Option<String>,
}

/// A named variable (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub id: NodeId,
    pub document_id: NodeId,
    pub name: String,
    pub data_type: String,
    pub value: Option<String>,
}

/// Closed set of dependency kinds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    Contains,
    Precedes,
    ReadsFrom,
    WritesTo,
    Calls,
    Uses,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Contains => "CONTAINS",
            DependencyKind::Precedes => "PRECEDES",
            DependencyKind::ReadsFrom => "READS_FROM",
            DependencyKind::WritesTo => "WRITES_TO",
            DependencyKind::Calls => "CALLS",
            DependencyKind::Uses => "USES",
        }
    }
}

/// An edge value (§3). `to_id` may be a deferred reference at parse time
/// (see `DependencyTarget`) — resolved to a real id by the builder (§4.4
/// step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub from_id: NodeId,
    pub to_id: DependencyTarget,
    pub kind: DependencyKind,
    pub properties: HashMap<String, String>,
    /// Confidence in this edge's correctness (1.0 for deterministic
    /// extraction, <1.0 for best-effort regex-based lineage — see the
    /// "best-effort lineage" decision in DESIGN.md).
    pub confidence: f32,
}

/// Either a concrete id already present in this `ParsedDocument`/the graph,
/// or a deferred reference resolved later by name (COBOL `CALL 'X'`, JCL
/// `EXEC PGM=X`) — §4.3, §4.4, §9 "cross-document references resolved by
/// name".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DependencyTarget {
    Id(NodeId),
    DeferredDocumentName(String),
}

/// What a parser hands the graph builder for one source artifact (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub document: Document,
    pub components: Vec<Component>,
    pub data_sources: Vec<DataSource>,
    pub data_entities: Vec<DataEntity>,
    pub parameters: Vec<Parameter>,
    pub dependencies: Vec<Dependency>,
    /// Non-fatal issues surfaced alongside a partial-success parse (§4.3, §7 PartialParse).
    pub warnings: Vec<String>,
}

impl ParsedDocument {
    pub fn empty(document: Document) -> Self {
        ParsedDocument {
            document,
            components: Vec::new(),
            data_sources: Vec::new(),
            data_entities: Vec::new(),
            parameters: Vec::new(),
            dependencies: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Normalize a locator/name for interning: lowercase, collapse whitespace —
/// §4.4 step 1.
pub fn normalize_identifier(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a `schema.name` / `owner.table` prefix, returning `(schema, name)`.
pub fn split_schema(raw: &str) -> (Option<String>, String) {
    let normalized = normalize_identifier(raw);
    match normalized.rsplit_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
            (Some(schema.to_string()), name.to_string())
        }
        _ => (None, normalized),
    }
}
