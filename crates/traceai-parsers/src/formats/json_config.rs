//! Schema-agnostic JSON pipeline config parser (§4.3). Rather than bind to
//! one tool's config schema, we walk any object/array structure looking for
//! recognizable shapes: `{"name", "depends_on"}` → Component + PRECEDES,
//! `{"source", "target"}` → READS_FROM/WRITES_TO pair, and a top-level
//! `parameters` object → Parameters. Anything else is recorded as a custom
//! attribute on the Document so no input is silently dropped (§4.3
//! parse_partial).

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use traceai_core::{
    Component, Dependency, DependencyKind, DependencyTarget, Document, DocumentKind, NodeId,
    Parameter, ParsedDocument,
};

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;

pub struct JsonConfigParser;

impl FormatParser for JsonConfigParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        serde_json::from_slice::<Value>(content).is_ok()
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let value: Value = serde_json::from_slice(content).map_err(|e| ParseError::MalformedInput {
            path: path.display().to_string(),
            detail: format!("invalid json: {e}"),
        })?;
        let content_hash = super::content_hash(content);

        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_else(|| "pipeline".to_string());

        let document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name,
            kind: DocumentKind::JsonConfig,
            source_path: path.display().to_string(),
            content_hash,
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        let mut parsed = ParsedDocument::empty(document.clone());
        let mut warnings = Vec::new();
        let mut named_nodes: HashMap<String, NodeId> = HashMap::new();

        if let Some(params) = value.get("parameters").and_then(Value::as_object) {
            for (key, val) in params {
                parsed.parameters.push(Parameter {
                    id: NodeId::parameter(&document.id, key),
                    document_id: document.id.clone(),
                    name: key.clone(),
                    data_type: json_type_name(val).to_string(),
                    value: scalar_as_string(val),
                });
            }
        }

        walk(&value, &document, &mut parsed, &mut named_nodes, &mut warnings);

        if parsed.components.is_empty() {
            warnings.push("no recognizable component/dependency shapes found in json".to_string());
        }
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

fn walk(
    value: &Value,
    document: &Document,
    parsed: &mut ParsedDocument,
    named_nodes: &mut HashMap<String, NodeId>,
    warnings: &mut Vec<String>,
) {
    match value {
        Value::Object(map) => {
            if let Some(name) = map.get("name").and_then(Value::as_str) {
                let component_id = named_component(document, name, named_nodes, parsed);

                if let Some(deps) = map.get("depends_on") {
                    for dep in iter_strings(deps) {
                        let dep_id = named_component(document, &dep, named_nodes, parsed);
                        parsed.dependencies.push(Dependency {
                            from_id: dep_id,
                            to_id: DependencyTarget::Id(component_id.clone()),
                            kind: DependencyKind::Precedes,
                            properties: HashMap::new(),
                            confidence: 1.0,
                        });
                    }
                }
            }

            if let (Some(source), Some(target)) = (map.get("source"), map.get("target")) {
                if let (Some(source), Some(target)) = (source.as_str(), target.as_str()) {
                    let (_, source_name) = traceai_core::split_schema(source);
                    let (_, target_name) = traceai_core::split_schema(target);
                    let source_id = NodeId::data_entity(None, &source_name);
                    let target_id = NodeId::data_entity(None, &target_name);
                    intern_entity(source, &source_id, parsed);
                    intern_entity(target, &target_id, parsed);

                    if let Some(owner) = map.get("name").and_then(Value::as_str) {
                        let component_id = named_component(document, owner, named_nodes, parsed);
                        parsed.dependencies.push(Dependency {
                            from_id: source_id,
                            to_id: DependencyTarget::Id(component_id.clone()),
                            kind: DependencyKind::ReadsFrom,
                            properties: HashMap::new(),
                            confidence: 1.0,
                        });
                        parsed.dependencies.push(Dependency {
                            from_id: component_id,
                            to_id: DependencyTarget::Id(target_id),
                            kind: DependencyKind::WritesTo,
                            properties: HashMap::new(),
                            confidence: 1.0,
                        });
                    } else {
                        warnings.push(format!("source/target pair {source}->{target} has no owning \"name\""));
                    }
                }
            }

            for (key, child) in map {
                if key == "parameters" {
                    continue;
                }
                walk(child, document, parsed, named_nodes, warnings);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, document, parsed, named_nodes, warnings);
            }
        }
        _ => {}
    }
}

fn named_component(
    document: &Document,
    name: &str,
    named_nodes: &mut HashMap<String, NodeId>,
    parsed: &mut ParsedDocument,
) -> NodeId {
    named_nodes
        .entry(name.to_string())
        .or_insert_with(|| {
            let id = NodeId::component(&document.id, name);
            parsed.components.push(Component {
                id: id.clone(),
                document_id: document.id.clone(),
                name: name.to_string(),
                component_type: "step".to_string(),
                description: None,
                source_excerpt: None,
                parse_partial: false,
            });
            id
        })
        .clone()
}

fn intern_entity(name: &str, id: &NodeId, parsed: &mut ParsedDocument) {
    if parsed.data_entities.iter().any(|e| &e.id == id) {
        return;
    }
    let (schema, entity_name) = traceai_core::split_schema(name);
    parsed.data_entities.push(traceai_core::DataEntity {
        id: id.clone(),
        name: entity_name,
        entity_type: "table".to_string(),
        columns: Vec::new(),
        schema,
    });
}

fn iter_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
        "name": "customer_pipeline",
        "parameters": { "batch_size": 500, "env": "prod" },
        "steps": [
            { "name": "extract", "source": "staging.customer_raw", "target": "staging.customer_clean" },
            { "name": "load", "depends_on": "extract", "source": "staging.customer_clean", "target": "dw.dim_customer" }
        ]
    }"#;

    #[test]
    fn extracts_components_parameters_and_lineage() {
        let parser = JsonConfigParser;
        let parsed = parser.parse(&PathBuf::from("pipeline.json"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.document.name, "customer_pipeline");
        assert!(parsed.parameters.iter().any(|p| p.name == "batch_size"));
        assert!(parsed.components.iter().any(|c| c.name == "extract"));
        assert!(parsed.components.iter().any(|c| c.name == "load"));
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::Precedes)));
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::ReadsFrom)));
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::WritesTo)));
    }
}
