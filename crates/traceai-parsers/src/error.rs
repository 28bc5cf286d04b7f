//! Parser-level error kinds (§4.3, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no parser registered for {0}")]
    UnsupportedFormat(String),

    #[error("duplicate parser registration for extension {0}")]
    DuplicateRegistration(String),

    #[error("malformed input in {path}: {detail}")]
    MalformedInput { path: String, detail: String },

    #[error("unsupported version in {path}: {detail}")]
    UnsupportedVersion { path: String, detail: String },

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;
