//! SSIS `.dtsx` parser (§4.3). SSIS packages are namespaced XML; we read
//! with `quick-xml` and match on local element names so SSIS 2012/2016/2019
//! dialect differences (namespace prefixes, extra unknown elements) are
//! tolerated rather than rejected (§6).

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use traceai_core::{
    Component, DataEntity, DataSource, DataSourceKind, Dependency, DependencyKind,
    DependencyTarget, Document, DocumentKind, NodeId, Parameter, ParsedDocument,
};

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;
use crate::sql_scan;

pub struct SsisParser;

impl FormatParser for SsisParser {
    fn validate(&self, _path: &Path, content: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&content[..content.len().min(512)]);
        head.contains("<?xml") && (head.contains("DTS:Executable") || head.contains("Executable"))
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument> {
        let text = std::str::from_utf8(content).map_err(|e| ParseError::MalformedInput {
            path: path.display().to_string(),
            detail: format!("not valid utf-8: {e}"),
        })?;

        let package_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UnknownPackage")
            .to_string();
        let content_hash = super::content_hash(content);
        let document = Document {
            id: NodeId::document(&path.display().to_string(), &content_hash),
            name: package_name.clone(),
            kind: DocumentKind::Ssis,
            source_path: path.display().to_string(),
            content_hash,
            parsed_at: chrono::Utc::now(),
            custom: HashMap::new(),
        };

        let mut parsed = ParsedDocument::empty(document.clone());
        let mut warnings = Vec::new();

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        // Component stack tracks nesting so precedence constraints / SQL
        // text inside an executable attach to the right component.
        let mut current_component: Option<Component> = None;
        let mut data_entities: HashMap<String, DataEntity> = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let local = local_name(e.name().as_ref());
                    let attrs = read_attrs(e);

                    match local.as_str() {
                        "Executable" => {
                            let name = attrs
                                .get("ObjectName")
                                .or_else(|| attrs.get("refId"))
                                .cloned()
                                .unwrap_or_else(|| format!("Executable{}", parsed.components.len()));
                            let subtype = attrs.get("ExecutableType").cloned().unwrap_or_default();
                            let component = Component {
                                id: NodeId::component(&document.id, &name),
                                document_id: document.id.clone(),
                                name,
                                component_type: format!("DtsExecutable:{subtype}"),
                                description: attrs.get("Description").cloned(),
                                source_excerpt: None,
                                parse_partial: false,
                            };
                            current_component = Some(component.clone());
                            parsed.components.push(component);
                        }
                        "ConnectionManager" => {
                            let name = attrs
                                .get("ObjectName")
                                .cloned()
                                .unwrap_or_else(|| format!("Connection{}", parsed.data_sources.len()));
                            let locator =
                                attrs.get("ConnectionString").cloned().unwrap_or_else(|| name.clone());
                            let normalized = traceai_core::normalize_identifier(&locator);
                            let source = DataSource {
                                id: NodeId::data_source(DataSourceKind::Db, &normalized),
                                name,
                                kind: DataSourceKind::Db,
                                locator,
                                properties: HashMap::new(),
                            };
                            parsed.data_sources.push(source);
                        }
                        "Variable" => {
                            let name = attrs
                                .get("ObjectName")
                                .cloned()
                                .unwrap_or_else(|| format!("Variable{}", parsed.parameters.len()));
                            let param = Parameter {
                                id: NodeId::parameter(&document.id, &name),
                                document_id: document.id.clone(),
                                name,
                                data_type: attrs.get("DataType").cloned().unwrap_or_default(),
                                value: attrs.get("Value").cloned(),
                            };
                            parsed.parameters.push(param);
                        }
                        "PrecedenceConstraint" => {
                            let (Some(from_name), Some(to_name)) =
                                (attrs.get("From"), attrs.get("To"))
                            else {
                                warnings.push("precedence constraint missing From/To".to_string());
                                continue;
                            };
                            parsed.dependencies.push(Dependency {
                                from_id: NodeId::component(&document.id, from_name),
                                to_id: DependencyTarget::Id(NodeId::component(&document.id, to_name)),
                                kind: DependencyKind::Precedes,
                                properties: HashMap::new(),
                                confidence: 1.0,
                            });
                        }
                        "SqlTaskData" | "SqlStatementSource" => {
                            if let Some(sql) = attrs.get("SqlStatementSource").or_else(|| attrs.get("SqlText")) {
                                apply_sql_references(
                                    sql,
                                    &current_component,
                                    &document,
                                    &mut parsed,
                                    &mut data_entities,
                                );
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(ref t)) => {
                    // Some dialects carry the SQL statement as element text
                    // rather than an attribute.
                    if let Ok(text) = t.unescape() {
                        if text.to_uppercase().contains("SELECT")
                            || text.to_uppercase().contains("INSERT")
                            || text.to_uppercase().contains("UPDATE")
                        {
                            apply_sql_references(
                                &text,
                                &current_component,
                                &document,
                                &mut parsed,
                                &mut data_entities,
                            );
                        }
                    }
                }
                Err(e) => {
                    warnings.push(format!("xml parse recovered at position {}: {e}", reader.buffer_position()));
                }
                _ => {}
            }
            buf.clear();
        }

        if parsed.components.is_empty() && parsed.data_sources.is_empty() {
            warnings.push("no recognizable SSIS executables or connection managers found".to_string());
        }

        parsed.data_entities = data_entities.into_values().collect();
        parsed.warnings = warnings;
        Ok(parsed)
    }
}

fn apply_sql_references(
    sql: &str,
    component: &Option<Component>,
    document: &Document,
    parsed: &mut ParsedDocument,
    data_entities: &mut HashMap<String, DataEntity>,
) {
    let Some(component) = component else { return };
    for reference in sql_scan::scan(sql) {
        let (schema, name) = traceai_core::split_schema(&reference.table);
        let entity_id = NodeId::data_entity(schema.as_deref(), &name);
        data_entities.entry(entity_id.to_string()).or_insert_with(|| DataEntity {
            id: entity_id.clone(),
            name: name.clone(),
            entity_type: "table".to_string(),
            columns: Vec::new(),
            schema,
        });

        let (from, to, kind) = if sql_scan::is_read(reference.verb) {
            (entity_id.clone(), component.id.clone(), DependencyKind::ReadsFrom)
        } else {
            (component.id.clone(), entity_id.clone(), DependencyKind::WritesTo)
        };
        let _ = document;
        parsed.dependencies.push(Dependency {
            from_id: from,
            to_id: DependencyTarget::Id(to),
            kind,
            properties: HashMap::new(),
            confidence: sql_scan::CONFIDENCE,
        });
    }
}

fn local_name(qualified: &[u8]) -> String {
    let s = String::from_utf8_lossy(qualified);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

fn read_attrs(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = local_name(attr.key.as_ref());
        if let Ok(value) = attr.unescape_value() {
            attrs.insert(key, value.to_string());
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<DTS:Executable xmlns:DTS="www.microsoft.com/SqlServer/Dts" DTS:ObjectName="LoadCustomers">
  <DTS:ConnectionManager DTS:ObjectName="StagingDb" DTS:ConnectionString="Data Source=staging"/>
  <DTS:Executable DTS:ObjectName="ExtractCustomers" DTS:ExecutableType="Microsoft.ExecuteSQLTask">
    <SqlTaskData SqlStatementSource="SELECT * FROM dbo.Customer"/>
  </DTS:Executable>
  <DTS:Executable DTS:ObjectName="MergeToWarehouse" DTS:ExecutableType="Microsoft.ExecuteSQLTask">
    <SqlTaskData SqlStatementSource="INSERT INTO dbo.Customer (id) VALUES (1)"/>
  </DTS:Executable>
  <DTS:PrecedenceConstraint DTS:From="ExtractCustomers" DTS:To="MergeToWarehouse"/>
  <DTS:Variable DTS:ObjectName="BatchId" DTS:DataType="Int32" DTS:Value="1"/>
</DTS:Executable>
"#;

    #[test]
    fn extracts_components_sources_and_lineage() {
        let parser = SsisParser;
        let path = PathBuf::from("load_customers.dtsx");
        let parsed = parser.parse(&path, SAMPLE.as_bytes()).unwrap();

        assert_eq!(parsed.document.name, "load_customers");
        assert!(parsed.components.iter().any(|c| c.name == "ExtractCustomers"));
        assert!(parsed.data_sources.iter().any(|s| s.name == "StagingDb"));
        assert!(parsed.parameters.iter().any(|p| p.name == "BatchId"));
        assert!(parsed
            .dependencies
            .iter()
            .any(|d| matches!(d.kind, DependencyKind::ReadsFrom)));
        assert!(parsed
            .dependencies
            .iter()
            .any(|d| matches!(d.kind, DependencyKind::WritesTo)));
        assert!(parsed.dependencies.iter().any(|d| matches!(d.kind, DependencyKind::Precedes)));
    }

    #[test]
    fn validate_requires_executable_marker() {
        let parser = SsisParser;
        let path = PathBuf::from("x.dtsx");
        assert!(parser.validate(&path, SAMPLE.as_bytes()));
        assert!(!parser.validate(&path, b"not xml at all"));
    }
}
