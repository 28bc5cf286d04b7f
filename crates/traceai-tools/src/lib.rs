//! The tool surface (C8, §4.8): six typed, pure operations over a graph
//! snapshot and vector index, exposed both as direct Rust calls
//! (`tools::*`, what the CLI uses) and as JSON over HTTP (`router`,
//! `handlers`).

pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod state;
pub mod tools;

pub use error::{ToolError, ToolResult};
pub use router::create_router;
pub use state::ServerState;
