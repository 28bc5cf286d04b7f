//! TraceAI Parsers — the per-format parser contract, the six built-in
//! format parsers, the parser registry, and the ingestion coordinator that
//! walks a directory tree and commits parsed documents into a
//! `traceai_core::GraphBuilder`.

pub mod coordinator;
pub mod error;
pub mod formats;
pub mod parser;
pub mod registry;
pub mod sql_scan;

pub use coordinator::{CancellationToken, Coordinator, IngestConfig, IngestReport, NoopVectorSink, VectorSink};
pub use error::{ParseError, ParseResult};
pub use parser::FormatParser;
pub use registry::{default_registry, ParserRegistry};

#[cfg(test)]
mod tests;
