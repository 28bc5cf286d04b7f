//! Embedding provider implementations (§4.6 `[AMBIENT]`).

pub mod local;
pub mod remote;

pub use local::LocalEmbeddingProvider;
pub use remote::RemoteEmbeddingProvider;
