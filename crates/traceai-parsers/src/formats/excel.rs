//! Excel `.xlsx` parser (§4.3), via `calamine`. Sheets become Components,
//! named ranges become Parameters, Tables become DataEntities, and formula
//! cells referencing another sheet or a named table surface CALLS/
//! READS_FROM edges (best-effort: calamine exposes formula text but not a
//! resolved AST, so references are extracted with a small regex scan).

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Reader, Xlsx};
use once_cell::sync::Lazy;
use regex::Regex;

use traceai_core::{
    Component, DataEntity, Dependency, DependencyKind, DependencyTarget, Document, DocumentKind,
    NodeId, Parameter, ParsedDocument,
};

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;

pub struct ExcelParser;

static SHEET_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_ ]*)!\$?[A-Z]+\$?\d+").unwrap()
});
static LOOKUP_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:VLOOKUP|HLOOKUP|INDEX)\s*\([^,]+,\s*([A-Za-z_][A-Za-z0-9_.]*)").unwrap()
});

impl FormatParser for ExcelParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        content.len() >= 4 && &content[..2] == b"PK"
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let content_hash = super::content_hash(content);
        let mut workbook: Xlsx<_> =
            open_workbook_from_rs(Cursor::new(content)).map_err(|e| ParseError::MalformedInput {
                path: path.display().to_string(),
                detail: format!("not a readable xlsx workbook: {e}"),
            })?;

        let workbook_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workbook")
            .to_string();

        let document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name: workbook_name,
            kind: DocumentKind::Excel,
            source_path: path.display().to_string(),
            content_hash,
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        let mut parsed = ParsedDocument::empty(document.clone());
        let mut warnings = Vec::new();
        let mut sheet_components: HashMap<String, NodeId> = HashMap::new();
        let mut data_entities: HashMap<String, DataEntity> = HashMap::new();

        for name in workbook.defined_names().iter().map(|(n, _)| n.clone()).collect::<Vec<_>>() {
            parsed.parameters.push(Parameter {
                id: NodeId::parameter(&document.id, &name),
                document_id: document.id.clone(),
                name: name.clone(),
                data_type: "named_range".to_string(),
                value: None,
            });
        }

        let sheet_names = workbook.sheet_names().to_vec();
        for sheet_name in &sheet_names {
            let component = Component {
                id: NodeId::component(&document.id, sheet_name),
                document_id: document.id.clone(),
                name: sheet_name.clone(),
                component_type: "sheet".to_string(),
                description: None,
                source_excerpt: None,
                parse_partial: false,
            };
            sheet_components.insert(sheet_name.clone(), component.id.clone());
            parsed.components.push(component);
        }

        for sheet_name in &sheet_names {
            let Ok(range) = workbook.worksheet_formula(sheet_name) else {
                continue;
            };
            let this_id = sheet_components.get(sheet_name).cloned().unwrap();

            for cell in range.used_cells() {
                let formula: &String = cell.2;
                for m in SHEET_REF.captures_iter(formula) {
                    let other_sheet = m[1].trim();
                    if other_sheet == sheet_name {
                        continue;
                    }
                    if let Some(other_id) = sheet_components.get(other_sheet) {
                        let edge_id = EdgeKey(this_id.clone(), other_id.clone());
                        if seen_calls(&parsed, &edge_id) {
                            continue;
                        }
                        parsed.dependencies.push(Dependency {
                            from_id: this_id.clone(),
                            to_id: DependencyTarget::Id(other_id.clone()),
                            kind: DependencyKind::Calls,
                            properties: HashMap::new(),
                            confidence: 0.8,
                        });
                    } else {
                        warnings.push(format!("formula in {sheet_name} references unknown sheet {other_sheet}"));
                    }
                }
                for m in LOOKUP_TABLE.captures_iter(formula) {
                    let table_name = m[1].to_string();
                    let (schema, name) = traceai_core::split_schema(&table_name);
                    let entity_id = NodeId::data_entity(schema.as_deref(), &name);
                    data_entities.entry(table_name.clone()).or_insert_with(|| DataEntity {
                        id: entity_id.clone(),
                        name: table_name.clone(),
                        entity_type: "table".to_string(),
                        columns: Vec::new(),
                        schema,
                    });
                    parsed.dependencies.push(Dependency {
                        from_id: entity_id,
                        to_id: DependencyTarget::Id(this_id.clone()),
                        kind: DependencyKind::ReadsFrom,
                        properties: HashMap::new(),
                        confidence: 0.7,
                    });
                }
            }
        }

        for table_name in workbook.table_names().to_vec() {
            let (schema, name) = traceai_core::split_schema(&table_name);
            let entity_id = NodeId::data_entity(schema.as_deref(), &name);
            data_entities.entry(table_name.clone()).or_insert_with(|| DataEntity {
                id: entity_id,
                name: table_name,
                entity_type: "table".to_string(),
                columns: Vec::new(),
                schema,
            });
        }

        if sheet_names.is_empty() {
            warnings.push("workbook contains no sheets".to_string());
        }

        parsed.data_entities = data_entities.into_values().collect();
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

struct EdgeKey(NodeId, NodeId);

fn seen_calls(parsed: &ParsedDocument, key: &EdgeKey) -> bool {
    parsed.dependencies.iter().any(|d| {
        matches!(d.kind, DependencyKind::Calls)
            && d.from_id == key.0
            && matches!(&d.to_id, DependencyTarget::Id(id) if id == &key.1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_checks_zip_magic() {
        let parser = ExcelParser;
        assert!(parser.validate(&Path::new("book.xlsx"), b"PK\x03\x04rest"));
        assert!(!parser.validate(&Path::new("book.xlsx"), b"not a zip"));
    }
}
