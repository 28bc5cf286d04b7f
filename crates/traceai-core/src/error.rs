//! Closed error kind set (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("traversal limit exceeded ({visited} nodes visited, cap {cap})")]
    LimitExceeded { visited: usize, cap: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
