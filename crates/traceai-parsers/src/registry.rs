//! Parser registry (C2, §4.2): maps file extensions to a single parser,
//! assembled once at startup and read-only thereafter (§5).

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::parser::FormatParser;

pub struct ParserRegistry {
    by_extension: HashMap<String, Box<dyn FormatParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        ParserRegistry { by_extension: HashMap::new() }
    }

    /// Register `parser` for every extension in `extensions` (case-insensitive).
    /// Fails with `DuplicateRegistration` on conflict (§4.2).
    pub fn register(
        &mut self,
        extensions: &[&str],
        parser: Box<dyn FormatParser>,
    ) -> ParseResult<()> {
        for ext in extensions {
            let key = ext.to_lowercase();
            if self.by_extension.contains_key(&key) {
                return Err(ParseError::DuplicateRegistration(key));
            }
        }
        let parser: std::sync::Arc<dyn FormatParser> = std::sync::Arc::from(parser);
        for ext in extensions {
            self.by_extension.insert(ext.to_lowercase(), wrap(parser.clone()));
        }
        Ok(())
    }

    /// Dispatch by extension (§4.2 `parser_for`); `None` if unsupported.
    pub fn parser_for(&self, path: &Path) -> Option<&dyn FormatParser> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.by_extension.get(&ext).map(|b| b.as_ref())
    }

    /// Cheap compatibility check delegated to the matched parser (§4.2 `validate`).
    pub fn validate(&self, path: &Path, content: &[u8]) -> bool {
        match self.parser_for(path) {
            Some(parser) => parser.validate(path, content),
            None => false,
        }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.parser_for(path).is_some()
    }
}

/// Adapt an `Arc<dyn FormatParser>` so the same parser instance can be keyed
/// under multiple extensions (e.g. `.cbl` and `.cob`) without re-boxing the
/// underlying parser per extension.
struct SharedParser(std::sync::Arc<dyn FormatParser>);

impl FormatParser for SharedParser {
    fn validate(&self, path: &Path, content: &[u8]) -> bool {
        self.0.validate(path, content)
    }

    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<traceai_core::ParsedDocument> {
        self.0.parse(path, content)
    }
}

fn wrap(parser: std::sync::Arc<dyn FormatParser>) -> Box<dyn FormatParser> {
    Box::new(SharedParser(parser))
}

/// Build the standard registry wired up with all six built-in format
/// parsers (§4.3).
pub fn default_registry() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(&["dtsx"], Box::new(crate::formats::ssis::SsisParser)).unwrap();
    registry.register(&["cbl", "cob"], Box::new(crate::formats::cobol::CobolParser)).unwrap();
    registry.register(&["jcl"], Box::new(crate::formats::jcl::JclParser)).unwrap();
    registry.register(&["json"], Box::new(crate::formats::json_config::JsonConfigParser)).unwrap();
    registry.register(&["xlsx"], Box::new(crate::formats::excel::ExcelParser)).unwrap();
    registry.register(&["csv"], Box::new(crate::formats::csv_lineage::CsvLineageParser)).unwrap();
    registry
}
