//! Tool-surface error kinds (§7): every failure from the underlying graph
//! or vector index is re-shaped into one closed set so a planner calling
//! over HTTP sees a stable typed body regardless of which collaborator
//! crate actually failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("traversal limit exceeded ({visited} nodes visited, cap {cap})")]
    LimitExceeded { visited: usize, cap: usize },

    #[error("embedding backend failed: {0}")]
    EmbeddingFailed(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

impl From<traceai_core::CoreError> for ToolError {
    fn from(err: traceai_core::CoreError) -> Self {
        match err {
            traceai_core::CoreError::InvalidArgument(msg) => ToolError::InvalidArgument(msg),
            traceai_core::CoreError::UnknownEntity(name) => ToolError::UnknownEntity(name),
            traceai_core::CoreError::LimitExceeded { visited, cap } => ToolError::LimitExceeded { visited, cap },
            traceai_core::CoreError::Cancelled => ToolError::Internal("operation cancelled".to_string()),
            traceai_core::CoreError::DeadlineExceeded => ToolError::Internal("deadline exceeded".to_string()),
            traceai_core::CoreError::Internal(msg) => ToolError::Internal(msg),
        }
    }
}

impl From<traceai_vector::VectorError> for ToolError {
    fn from(err: traceai_vector::VectorError) -> Self {
        match err {
            traceai_vector::VectorError::InvalidArgument(msg) => ToolError::InvalidArgument(msg),
            traceai_vector::VectorError::EmbeddingFailed { provider, detail } => {
                ToolError::EmbeddingFailed(format!("{provider}: {detail}"))
            }
            traceai_vector::VectorError::Internal(msg) => ToolError::Internal(msg),
        }
    }
}

impl ToolError {
    /// HTTP status for the axum JSON error body.
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ToolError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ToolError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            ToolError::LimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ToolError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
            ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind, carried in the JSON error body so a
    /// planner can branch on it without parsing prose.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArgument(_) => "invalid_argument",
            ToolError::UnknownEntity(_) => "unknown_entity",
            ToolError::LimitExceeded { .. } => "limit_exceeded",
            ToolError::EmbeddingFailed(_) => "embedding_failed",
            ToolError::Internal(_) => "internal",
        }
    }
}
