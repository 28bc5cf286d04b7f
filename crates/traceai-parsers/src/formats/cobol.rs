//! COBOL `.cbl`/`.cob` parser (§4.3). Fixed-form COBOL is column-significant
//! (positions 7-72); free-form is accepted behind a best-effort fallback
//! when a line doesn't look column-aligned (§6).

use std::collections::HashMap;
use std::path::Path;

use traceai_core::{
    normalize_identifier, split_schema, Component, DataEntity, DataSource, DataSourceKind,
    Dependency, DependencyKind, DependencyTarget, Document, DocumentKind, NodeId, ParsedDocument,
};

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;
use crate::sql_scan;

pub struct CobolParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Division {
    Identification,
    Environment,
    Data,
    Procedure,
    Other,
}

impl FormatParser for CobolParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&content[..content.len().min(2048)]).to_uppercase();
        head.contains("IDENTIFICATION DIVISION") || head.contains("PROGRAM-ID")
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let text = String::from_utf8_lossy(content);
        let content_hash = super::content_hash(content);

        let mut program_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_uppercase();

        let mut division = Division::Other;
        let mut warnings = Vec::new();
        let mut data_sources: HashMap<String, DataSource> = HashMap::new();
        let mut data_entities: HashMap<String, DataEntity> = HashMap::new();
        let mut components: Vec<Component> = Vec::new();
        let mut dependencies: Vec<Dependency> = Vec::new();
        let mut current_paragraph: Option<String> = None;
        let mut current_select_file: Option<(String, String)> = None; // (file-name, ddname/locator)
        let mut exec_sql_buffer: Option<String> = None;

        // Placeholder document id; finalized once the real program name is known.
        let mut document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name: program_name.clone(),
            kind: DocumentKind::Cobol,
            source_path: path.display().to_string(),
            content_hash: content_hash.clone(),
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        for raw_line in text.lines() {
            let significant = significant_text(raw_line);
            let trimmed = significant.trim();
            if trimmed.is_empty() {
                continue;
            }
            let upper = trimmed.to_uppercase();

            if upper.starts_with("IDENTIFICATION DIVISION") {
                division = Division::Identification;
                continue;
            }
            if upper.starts_with("ENVIRONMENT DIVISION") {
                division = Division::Environment;
                continue;
            }
            if upper.starts_with("DATA DIVISION") {
                division = Division::Data;
                continue;
            }
            if upper.starts_with("PROCEDURE DIVISION") {
                division = Division::Procedure;
                continue;
            }

            match division {
                Division::Identification => {
                    if let Some(name) = upper.strip_prefix("PROGRAM-ID.") {
                        program_name = name.trim().trim_end_matches('.').to_string();
                        document.name = program_name.clone();
                        document.id = NodeId::document(&path.display().to_string(), &content_hash);
                    }
                }
                Division::Environment => {
                    if upper.contains("SELECT") {
                        if let Some(file_name) = extract_token_after(&upper, "SELECT") {
                            current_select_file = Some((file_name, String::new()));
                        }
                    }
                    if upper.contains("ASSIGN TO") {
                        if let Some((file_name, _)) = current_select_file.clone() {
                            if let Some(locator) = extract_token_after(&upper, "ASSIGN TO") {
                                let normalized = normalize_identifier(&locator);
                                let source = DataSource {
                                    id: NodeId::data_source(DataSourceKind::File, &normalized),
                                    name: file_name.clone(),
                                    kind: DataSourceKind::File,
                                    locator: locator.clone(),
                                    properties: HashMap::new(),
                                };
                                data_sources.insert(file_name.clone(), source);
                                current_select_file = None;
                            }
                        }
                    }
                }
                Division::Data => {
                    if let Some(rest) = upper.strip_prefix("01 ").or_else(|| upper.strip_prefix("01  ")) {
                        let record_name = rest.split_whitespace().next().unwrap_or("").trim_end_matches('.');
                        if !record_name.is_empty() {
                            let (schema, name) = split_schema(record_name);
                            let id = NodeId::data_entity(schema.as_deref(), &name);
                            data_entities.entry(record_name.to_string()).or_insert(DataEntity {
                                id,
                                name: record_name.to_string(),
                                entity_type: "record".to_string(),
                                columns: Vec::new(),
                                schema,
                            });
                        }
                    }
                }
                Division::Procedure => {
                    if is_paragraph_header(trimmed) {
                        let name = trimmed.trim_end_matches('.').to_string();
                        current_paragraph = Some(name.clone());
                        components.push(Component {
                            id: NodeId::component(&document.id, &name),
                            document_id: document.id.clone(),
                            name,
                            component_type: "paragraph".to_string(),
                            description: None,
                            source_excerpt: None,
                            parse_partial: false,
                        });
                        continue;
                    }

                    let Some(paragraph) = current_paragraph.clone() else {
                        continue;
                    };
                    let component_id = NodeId::component(&document.id, &paragraph);

                    if upper.starts_with("EXEC SQL") {
                        exec_sql_buffer = Some(String::new());
                        continue;
                    }
                    if let Some(buf) = exec_sql_buffer.as_mut() {
                        if upper.starts_with("END-EXEC") {
                            let sql = exec_sql_buffer.take().unwrap();
                            for reference in sql_scan::scan(&sql) {
                                let (schema, name) = split_schema(&reference.table);
                                let entity_id = NodeId::data_entity(schema.as_deref(), &name);
                                data_entities.entry(reference.table.clone()).or_insert(DataEntity {
                                    id: entity_id.clone(),
                                    name: reference.table.clone(),
                                    entity_type: "table".to_string(),
                                    columns: Vec::new(),
                                    schema,
                                });
                                let (from, to, kind) = if sql_scan::is_read(reference.verb) {
                                    (entity_id.clone(), component_id.clone(), DependencyKind::ReadsFrom)
                                } else {
                                    (component_id.clone(), entity_id.clone(), DependencyKind::WritesTo)
                                };
                                dependencies.push(Dependency {
                                    from_id: from,
                                    to_id: DependencyTarget::Id(to),
                                    kind,
                                    properties: HashMap::new(),
                                    confidence: sql_scan::CONFIDENCE,
                                });
                            }
                        } else {
                            buf.push(' ');
                            buf.push_str(trimmed);
                        }
                        continue;
                    }

                    if upper.starts_with("PERFORM ") {
                        if let Some(target) = extract_token_after(&upper, "PERFORM") {
                            dependencies.push(Dependency {
                                from_id: component_id.clone(),
                                to_id: DependencyTarget::Id(NodeId::component(&document.id, &target)),
                                kind: DependencyKind::Calls,
                                properties: HashMap::new(),
                                confidence: 1.0,
                            });
                        }
                    } else if let Some(target) = extract_quoted_after(trimmed, "CALL") {
                        dependencies.push(Dependency {
                            from_id: component_id.clone(),
                            to_id: DependencyTarget::DeferredDocumentName(target),
                            kind: DependencyKind::Calls,
                            properties: HashMap::new(),
                            confidence: 1.0,
                        });
                    } else if let Some(file_name) = io_verb_target(&upper) {
                        if let Some(source) = data_sources.get(&file_name) {
                            let kind = if upper.starts_with("READ ") {
                                DependencyKind::ReadsFrom
                            } else {
                                DependencyKind::WritesTo
                            };
                            let (from, to) = if kind == DependencyKind::ReadsFrom {
                                (source.id.clone(), component_id.clone())
                            } else {
                                (component_id.clone(), source.id.clone())
                            };
                            dependencies.push(Dependency {
                                from_id: from,
                                to_id: DependencyTarget::Id(to),
                                kind,
                                properties: HashMap::new(),
                                confidence: 1.0,
                            });
                        } else {
                            warnings.push(format!("{file_name} used in I/O but never SELECTed"));
                        }
                    }
                }
                Division::Other => {}
            }
        }

        if components.is_empty() {
            warnings.push("no PROCEDURE DIVISION paragraphs found".to_string());
        }

        let mut parsed = ParsedDocument::empty(document);
        parsed.components = components;
        parsed.data_sources = data_sources.into_values().collect();
        parsed.data_entities = data_entities.into_values().collect();
        parsed.dependencies = dependencies;
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

/// Positions 7-72 are significant in fixed-form COBOL; column 7 holds an
/// indicator ('*' comment, '-' continuation). Free-form lines (no leading
/// sequence-number area) are passed through unchanged.
fn significant_text(line: &str) -> &str {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= 6 {
        return line;
    }
    if chars.get(6) == Some(&'*') {
        return "";
    }
    let end = chars.len().min(72);
    let start = 6.min(end);
    let slice: &str = &line[byte_index(line, start)..byte_index(line, end)];
    slice
}

fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(b, _)| b).unwrap_or(s.len())
}

/// No-operand verbs that share a paragraph header's shape (single token
/// ending in a period) but aren't one.
const RESERVED_SINGLE_TOKEN_VERBS: [&str; 4] = ["CONTINUE.", "STOP.", "EXIT.", "NEXT."];

fn is_paragraph_header(trimmed: &str) -> bool {
    if trimmed.contains(' ') {
        return false;
    }
    if !trimmed.ends_with('.') || trimmed.len() <= 1 {
        return false;
    }
    let upper = trimmed.to_uppercase();
    !RESERVED_SINGLE_TOKEN_VERBS.contains(&upper.as_str())
}

fn extract_token_after(upper: &str, keyword: &str) -> Option<String> {
    let idx = upper.find(keyword)?;
    let rest = upper[idx + keyword.len()..].trim_start();
    let token = rest.split(|c: char| c.is_whitespace() || c == '.').next()?;
    if token.is_empty() {
        None
    } else {
        Some(token.trim_start_matches("TO").trim().to_string())
    }
}

fn extract_quoted_after(line: &str, keyword: &str) -> Option<String> {
    let upper = line.to_uppercase();
    if !upper.trim_start().starts_with(keyword) {
        return None;
    }
    let start = line.find('\'').or_else(|| line.find('"'))?;
    let quote = line.as_bytes()[start] as char;
    let rest = &line[start + 1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn io_verb_target(upper: &str) -> Option<String> {
    for verb in ["READ ", "WRITE ", "REWRITE ", "DELETE "] {
        if upper.starts_with(verb) {
            return upper[verb.len()..]
                .split_whitespace()
                .next()
                .map(|s| s.trim_end_matches('.').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
       IDENTIFICATION DIVISION.
       PROGRAM-ID. CUST001.
       ENVIRONMENT DIVISION.
       FILE-CONTROL.
           SELECT CUSTOMER-FILE ASSIGN TO CUSTOMER.INPUT.MASTER.
           SELECT CUSTMAST ASSIGN TO CUSTMAST.
       DATA DIVISION.
       WORKING-STORAGE SECTION.
       01 CUSTOMER-RECORD.
       PROCEDURE DIVISION.
       MAIN-PARA.
           READ CUSTOMER-FILE.
           WRITE CUSTMAST.
           PERFORM VALIDATE-PARA.
       VALIDATE-PARA.
           CALL 'VALIDATOR'.
"#;

    #[test]
    fn extracts_program_name_files_and_paragraphs() {
        let parser = CobolParser;
        let parsed = parser.parse(&PathBuf::from("cust001.cbl"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.document.name, "CUST001");
        assert!(parsed.data_sources.iter().any(|s| s.name == "CUSTOMER-FILE"));
        assert!(parsed.data_sources.iter().any(|s| s.name == "CUSTMAST"));
        assert!(parsed.components.iter().any(|c| c.name == "MAIN-PARA"));
        assert!(parsed.components.iter().any(|c| c.name == "VALIDATE-PARA"));
        assert!(parsed
            .dependencies
            .iter()
            .any(|d| matches!(d.kind, DependencyKind::ReadsFrom)));
        assert!(parsed
            .dependencies
            .iter()
            .any(|d| matches!(d.kind, DependencyKind::WritesTo)));
        assert!(parsed.dependencies.iter().any(|d| matches!(
            &d.to_id,
            DependencyTarget::DeferredDocumentName(name) if name == "VALIDATOR"
        )));
    }
}
