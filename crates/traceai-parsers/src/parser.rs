//! The per-format parser contract (§4.3): pure functions from file bytes to
//! a `ParsedDocument`, safe to invoke concurrently on distinct paths.

use std::path::Path;

use traceai_core::ParsedDocument;

use crate::error::ParseResult;

/// Parsers must be `Send + Sync`: the coordinator (§4.7) shares one
/// registry across concurrent `spawn_blocking` parse tasks.
pub trait FormatParser: Send + Sync {
    /// Cheap header sniff so the coordinator can skip unsupported files
    /// without paying full parse cost (§4.2 `validate`).
    fn validate(&self, path: &Path, content: &[u8]) -> bool;

    /// Parse the full file into a self-consistent `ParsedDocument` (§4.1).
    fn parse(&self, path: &Path, content: &[u8]) -> ParseResult<ParsedDocument>;
}
