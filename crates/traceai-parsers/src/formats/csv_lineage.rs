//! CSV lineage-mapping parser (§4.3): a spreadsheet of
//! `source[,source_field],target[,target_field][,transformation_logic]`
//! rows, each row becoming a READS_FROM/WRITES_TO pair through a synthetic
//! Component representing that mapping row. Delimiter is sniffed from the
//! header line since lineage exports come from many tools (Excel CSV
//! exports with `;`, tab-separated dumps, plain commas).

use std::collections::HashMap;
use std::path::Path;

use traceai_core::{
    Component, DataEntity, Dependency, DependencyKind, DependencyTarget, Document, DocumentKind,
    NodeId, ParsedDocument,
};

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;

pub struct CsvLineageParser;

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

impl FormatParser for CsvLineageParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        let Some(header) = first_line(content) else { return false };
        let header = header.to_lowercase();
        header.contains("source") && header.contains("target")
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let content_hash = super::content_hash(content);
        let delimiter = sniff_delimiter(content).ok_or_else(|| ParseError::MalformedInput {
            path: path.display().to_string(),
            detail: "could not determine a header row to sniff delimiter from".to_string(),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(content);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ParseError::MalformedInput {
                path: path.display().to_string(),
                detail: format!("invalid csv header: {e}"),
            })?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let shape = Shape::detect(&headers).ok_or_else(|| ParseError::MalformedInput {
            path: path.display().to_string(),
            detail: format!("unrecognized column header shape: {headers:?}"),
        })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("lineage")
            .to_string();
        let document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name,
            kind: DocumentKind::CsvLineage,
            source_path: path.display().to_string(),
            content_hash,
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        let mut parsed = ParsedDocument::empty(document.clone());
        let mut warnings = Vec::new();
        let mut data_entities: HashMap<String, DataEntity> = HashMap::new();
        let mut row_index = 0usize;

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warnings.push(format!("skipped malformed row {row_index}: {e}"));
                    row_index += 1;
                    continue;
                }
            };
            row_index += 1;

            let Some((source, target, transform)) = shape.extract(&record) else {
                warnings.push(format!("row {row_index} missing required source/target fields"));
                continue;
            };
            if source.is_empty() || target.is_empty() {
                warnings.push(format!("row {row_index} has empty source or target"));
                continue;
            }

            let source_id = intern_entity(&source, &mut data_entities);
            let target_id = intern_entity(&target, &mut data_entities);

            let mapping_name = format!("row_{row_index}_{source}_to_{target}");
            let component = Component {
                id: NodeId::component(&document.id, &mapping_name),
                document_id: document.id.clone(),
                name: mapping_name,
                component_type: "mapping".to_string(),
                description: transform,
                source_excerpt: None,
                parse_partial: false,
            };
            let component_id = component.id.clone();
            parsed.components.push(component);

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
        }

        if parsed.components.is_empty() {
            warnings.push("no usable lineage rows found".to_string());
        }
        parsed.data_entities = data_entities.into_values().collect();
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

fn intern_entity(raw: &str, data_entities: &mut HashMap<String, DataEntity>) -> NodeId {
    let (schema, name) = traceai_core::split_schema(raw);
    let id = NodeId::data_entity(schema.as_deref(), &name);
    data_entities.entry(raw.to_string()).or_insert_with(|| DataEntity {
        id: id.clone(),
        name: raw.to_string(),
        entity_type: "table".to_string(),
        columns: Vec::new(),
        schema,
    });
    id
}

enum Shape {
    /// `source,target`
    TableToTable { source: usize, target: usize },
    /// `source_field,target_field` (table qualifier carried in the field itself)
    FieldToField { source: usize, target: usize },
    /// `source_table,target_table,transformation_logic`
    TableToTableWithTransform { source: usize, target: usize, transform: usize },
}

impl Shape {
    fn detect(headers: &[String]) -> Option<Shape> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        if let (Some(source), Some(target)) = (find("source_table"), find("target_table")) {
            return Some(match find("transformation_logic") {
                Some(transform) => Shape::TableToTableWithTransform { source, target, transform },
                None => Shape::TableToTable { source, target },
            });
        }
        if let (Some(source), Some(target)) = (find("source_field"), find("target_field")) {
            return Some(Shape::FieldToField { source, target });
        }
        if let (Some(source), Some(target)) = (find("source"), find("target")) {
            return Some(Shape::TableToTable { source, target });
        }
        None
    }

    fn extract(&self, record: &csv::StringRecord) -> Option<(String, String, Option<String>)> {
        match *self {
            Shape::TableToTable { source, target } | Shape::FieldToField { source, target } => {
                let s = record.get(source)?.to_string();
                let t = record.get(target)?.to_string();
                Some((s, t, None))
            }
            Shape::TableToTableWithTransform { source, target, transform } => {
                let s = record.get(source)?.to_string();
                let t = record.get(target)?.to_string();
                let logic = record.get(transform).filter(|s| !s.is_empty()).map(str::to_string);
                Some((s, t, logic))
            }
        }
    }
}

fn first_line(content: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(content).ok()?;
    text.lines().next()
}

fn sniff_delimiter(content: &[u8]) -> Option<u8> {
    let header = first_line(content)?;
    CANDIDATE_DELIMITERS
        .into_iter()
        .max_by_key(|&d| header.matches(d as char).count())
        .filter(|&d| header.matches(d as char).count() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_table_to_table_comma_csv() {
        let sample = "source,target\nstaging.customer_raw,dw.dim_customer\nstaging.order_raw,dw.fact_order\n";
        let parser = CsvLineageParser;
        let parsed = parser.parse(&PathBuf::from("lineage.csv"), sample.as_bytes()).unwrap();
        assert_eq!(parsed.components.len(), 2);
        assert_eq!(parsed.data_entities.len(), 4);
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::ReadsFrom)));
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::WritesTo)));
    }

    #[test]
    fn sniffs_semicolon_delimiter_and_transform_column() {
        let sample = "source_table;target_table;transformation_logic\nraw.accounts;dw.dim_account;TRIM and uppercase\n";
        let parser = CsvLineageParser;
        let parsed = parser.parse(&PathBuf::from("lineage.csv"), sample.as_bytes()).unwrap();
        assert_eq!(parsed.components.len(), 1);
        assert_eq!(parsed.components[0].description.as_deref(), Some("TRIM and uppercase"));
    }

    #[test]
    fn validate_requires_source_and_target_headers() {
        let parser = CsvLineageParser;
        assert!(parser.validate(&PathBuf::from("x.csv"), b"source,target\na,b\n"));
        assert!(!parser.validate(&PathBuf::from("x.csv"), b"foo,bar\n1,2\n"));
    }
}
