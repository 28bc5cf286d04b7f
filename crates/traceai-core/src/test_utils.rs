//! Fixture builders for TraceAI core unit tests.

use std::collections::HashMap;

use crate::model::{
    Component, DataEntity, DataSource, DataSourceKind, Dependency, DependencyKind,
    DependencyTarget, Document, DocumentKind, NodeId, Parameter, ParsedDocument,
};

/// A bare document with no components/edges, useful as a commit target.
pub fn sample_document(name: &str, path: &str, kind: DocumentKind) -> Document {
    Document {
        id: NodeId::document(path, name),
        name: name.to_string(),
        kind,
        source_path: path.to_string(),
        content_hash: format!("hash-of-{name}"),
        parsed_at: chrono::Utc::now(),
        custom: HashMap::new(),
    }
}

pub fn sample_component(document: &Document, name: &str, component_type: &str) -> Component {
    Component {
        id: NodeId::component(&document.id, name),
        document_id: document.id.clone(),
        name: name.to_string(),
        component_type: component_type.to_string(),
        description: None,
        source_excerpt: None,
        parse_partial: false,
    }
}

pub fn sample_data_entity(name: &str, schema: Option<&str>) -> DataEntity {
    let (_, normalized) = crate::model::split_schema(name);
    DataEntity {
        id: NodeId::data_entity(schema, &normalized),
        name: name.to_string(),
        entity_type: "table".to_string(),
        columns: Vec::new(),
        schema: schema.map(str::to_string),
    }
}

pub fn sample_data_source(locator: &str, kind: DataSourceKind) -> DataSource {
    DataSource {
        id: NodeId::data_source(kind, &crate::model::normalize_identifier(locator)),
        name: locator.to_string(),
        kind,
        locator: locator.to_string(),
        properties: HashMap::new(),
    }
}

pub fn sample_parameter(document: &Document, name: &str) -> Parameter {
    Parameter {
        id: NodeId::parameter(&document.id, name),
        document_id: document.id.clone(),
        name: name.to_string(),
        data_type: "string".to_string(),
        value: None,
    }
}

pub fn dependency(from: NodeId, to: NodeId, kind: DependencyKind, confidence: f32) -> Dependency {
    Dependency {
        from_id: from,
        to_id: DependencyTarget::Id(to),
        kind,
        properties: HashMap::new(),
        confidence,
    }
}

/// A one-document parsed pipeline: `SOURCE_TABLE --reads--> component --writes--> SINK_TABLE`.
///
/// Edge direction follows §4.5's lineage convention: READS_FROM points from
/// the entity to the reading component, WRITES_TO from the component to the
/// entity it writes — so downstream traversal is a straight walk of
/// outgoing edges.
pub fn sample_etl_pipeline() -> ParsedDocument {
    let document = sample_document("LOAD_CUSTOMERS", "/ssis/load_customers.dtsx", DocumentKind::Ssis);
    let component = sample_component(&document, "DFT Load Customers", "DataFlowTask");
    let source = sample_data_entity("staging.customer_raw", Some("staging"));
    let sink = sample_data_entity("dw.dim_customer", Some("dw"));

    let mut parsed = ParsedDocument::empty(document);
    parsed.dependencies.push(dependency(
        source.id.clone(),
        component.id.clone(),
        DependencyKind::ReadsFrom,
        1.0,
    ));
    parsed.dependencies.push(dependency(
        component.id.clone(),
        sink.id.clone(),
        DependencyKind::WritesTo,
        1.0,
    ));
    parsed.components.push(component);
    parsed.data_entities.push(source);
    parsed.data_entities.push(sink);
    parsed
}
