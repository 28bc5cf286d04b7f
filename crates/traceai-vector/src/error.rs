//! Vector-index error kinds (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding provider {provider} failed: {detail}")]
    EmbeddingFailed { provider: String, detail: String },

    #[error("internal vector index invariant violated: {0}")]
    Internal(String),
}

pub type VectorResult<T> = Result<T, VectorError>;
