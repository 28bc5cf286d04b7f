//! JCL `.jcl` parser (§4.3). JCL statements are column-7-anchored `//NAME OP
//! PARMS` records; continuation lines start with `//` and leading
//! whitespace. We tokenize line-by-line and join continuations before
//! parsing each logical statement.

use std::collections::HashMap;
use std::path::Path;

use traceai_core::{
    Component, DataEntity, DataSource, DataSourceKind, Dependency, DependencyKind,
    DependencyTarget, Document, DocumentKind, NodeId, ParsedDocument,
};

use crate::error::ParseResult;
use crate::parser::FormatParser;

pub struct JclParser;

impl FormatParser for JclParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&content[..content.len().min(1024)]);
        head.lines().any(|l| l.starts_with("//") && l.to_uppercase().contains("JOB"))
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let text = String::from_utf8_lossy(content);
        let content_hash = super::content_hash(content);
        let statements = join_continuations(&text);

        let mut job_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_uppercase();

        let mut warnings = Vec::new();
        let mut components = Vec::new();
        let mut data_sources: HashMap<String, DataSource> = HashMap::new();
        let mut dependencies = Vec::new();
        let mut previous_step: Option<NodeId> = None;
        let mut current_step: Option<(NodeId, String)> = None;

        for statement in &statements {
            let Some((name, operation, operands)) = split_statement(statement) else {
                continue;
            };

            if operation.eq_ignore_ascii_case("JOB") {
                if !name.is_empty() {
                    job_name = name.to_string();
                }
                continue;
            }

            // Placeholder; replaced below once job_name/document id are final.
            let document_id_seed = NodeId::document(&path.display().to_string(), &content_hash);

            if operation.eq_ignore_ascii_case("EXEC") {
                let program = operands
                    .get("PGM")
                    .cloned()
                    .or_else(|| operands.get("PROC").cloned());
                let step_name = if name.is_empty() { format!("STEP{}", components.len()) } else { name.to_string() };
                let component = Component {
                    id: NodeId::component(&document_id_seed, &step_name),
                    document_id: document_id_seed.clone(),
                    name: step_name.clone(),
                    component_type: "step".to_string(),
                    description: program.clone(),
                    source_excerpt: None,
                    parse_partial: false,
                };
                let step_id = component.id.clone();
                components.push(component);

                if let Some(prev) = previous_step.clone() {
                    dependencies.push(Dependency {
                        from_id: prev,
                        to_id: DependencyTarget::Id(step_id.clone()),
                        kind: DependencyKind::Precedes,
                        properties: HashMap::new(),
                        confidence: 1.0,
                    });
                }
                previous_step = Some(step_id.clone());

                if let Some(program) = program {
                    dependencies.push(Dependency {
                        from_id: step_id.clone(),
                        to_id: DependencyTarget::DeferredDocumentName(program),
                        kind: DependencyKind::Calls,
                        properties: HashMap::new(),
                        confidence: 0.9,
                    });
                }
                current_step = Some((step_id, step_name));
                continue;
            }

            if operation.eq_ignore_ascii_case("DD") {
                let Some((step_id, _)) = current_step.clone() else {
                    warnings.push(format!("DD statement {name} outside any EXEC step"));
                    continue;
                };
                let Some(dsn) = operands.get("DSN").cloned() else {
                    continue;
                };
                let normalized = traceai_core::normalize_identifier(&dsn);
                let source = data_sources.entry(normalized.clone()).or_insert_with(|| DataSource {
                    id: NodeId::data_source(DataSourceKind::Dataset, &normalized),
                    name: dsn.clone(),
                    kind: DataSourceKind::Dataset,
                    locator: dsn.clone(),
                    properties: HashMap::new(),
                });

                let disp = operands.get("DISP").map(|s| s.to_uppercase()).unwrap_or_default();
                let is_output = disp.contains("NEW") || disp.contains("CATLG") || disp.contains("MOD");
                let (from, to, kind) = if is_output {
                    (step_id.clone(), source.id.clone(), DependencyKind::WritesTo)
                } else {
                    (source.id.clone(), step_id.clone(), DependencyKind::ReadsFrom)
                };
                dependencies.push(Dependency {
                    from_id: from,
                    to_id: DependencyTarget::Id(to),
                    kind,
                    properties: HashMap::new(),
                    confidence: 1.0,
                });
            }
        }

        let document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name: job_name,
            kind: DocumentKind::Jcl,
            source_path: path.display().to_string(),
            content_hash,
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        if components.is_empty() {
            warnings.push("no EXEC steps found".to_string());
        }

        let mut parsed = ParsedDocument::empty(document);
        parsed.components = components;
        parsed.data_sources = data_sources.into_values().collect();
        parsed.data_entities = Vec::<DataEntity>::new();
        parsed.dependencies = dependencies;
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

/// Join `//NAME OP PARMS` statements with following continuation lines
/// (a non-blank column-1/2 `//` line whose operand field is empty, or any
/// line that isn't itself a new `//` statement start gets appended).
fn join_continuations(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        if raw.starts_with("//*") {
            continue; // comment
        }
        if raw.starts_with("//") && raw.trim_start_matches('/').chars().next().map(|c| !c.is_whitespace()).unwrap_or(false) {
            if let Some(done) = current.take() {
                statements.push(done);
            }
            current = Some(raw.trim_end().to_string());
        } else if raw.starts_with("//") {
            // Continuation line (blank name field).
            if let Some(buf) = current.as_mut() {
                buf.push(' ');
                buf.push_str(raw.trim_start_matches('/').trim());
            }
        }
    }
    if let Some(done) = current.take() {
        statements.push(done);
    }
    statements
}

/// Split a joined `//NAME OP OPERANDS` statement into `(name, operation,
/// key=value operand map)`.
fn split_statement(statement: &str) -> Option<(String, String, HashMap<String, String>)> {
    let rest = statement.strip_prefix("//")?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let remainder = parts.next().unwrap_or("").trim();

    let (name, op_and_operands) = if first.eq_ignore_ascii_case("JOB")
        || first.eq_ignore_ascii_case("EXEC")
        || first.eq_ignore_ascii_case("DD")
    {
        (String::new(), format!("{first} {remainder}"))
    } else {
        (first.to_string(), remainder.to_string())
    };

    let mut op_parts = op_and_operands.trim().splitn(2, char::is_whitespace);
    let operation = op_parts.next().unwrap_or("").to_string();
    let operand_str = op_parts.next().unwrap_or("");

    let mut operands = HashMap::new();
    for field in split_operands(operand_str) {
        if let Some((key, value)) = field.split_once('=') {
            operands.insert(key.trim().to_uppercase(), value.trim().trim_matches('\'').to_string());
        }
    }
    Some((name, operation, operands))
}

/// Split comma-separated operands while respecting parenthesized groups
/// (e.g. `DISP=(NEW,CATLG,DELETE)`), since a naive `split(',')` would break
/// those apart.
fn split_operands(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => { depth += 1; current.push(c); }
            ')' => { depth -= 1; current.push(c); }
            ',' if depth == 0 => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = "//CUSTJOB JOB (ACCT),'CUSTOMER LOAD'\n//STEP1   EXEC PGM=CUSTEXTR\n//INFILE  DD DSN=PROD.CUSTOMER.MASTER,DISP=SHR\n//OUTFILE DD DSN=STAGE.CUSTOMER.EXTRACT,DISP=(NEW,CATLG,DELETE)\n//STEP2   EXEC PGM=CUSTLOAD\n//INFILE  DD DSN=STAGE.CUSTOMER.EXTRACT,DISP=SHR\n";

    #[test]
    fn extracts_steps_datasets_and_precedence() {
        let parser = JclParser;
        let parsed = parser.parse(&PathBuf::from("custjob.jcl"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.document.name, "CUSTJOB");
        assert_eq!(parsed.components.len(), 2);
        assert!(parsed.data_sources.iter().any(|s| s.name.contains("PROD.CUSTOMER.MASTER")));
        assert!(parsed
            .dependencies
            .iter()
            .any(|d| matches!(d.kind, DependencyKind::Precedes)));
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
            DependencyTarget::DeferredDocumentName(name) if name == "CUSTEXTR"
        )));
    }

    #[test]
    fn validate_requires_job_card() {
        let parser = JclParser;
        assert!(parser.validate(&PathBuf::from("x.jcl"), SAMPLE.as_bytes()));
        assert!(!parser.validate(&PathBuf::from("x.jcl"), b"not jcl"));
    }
}
