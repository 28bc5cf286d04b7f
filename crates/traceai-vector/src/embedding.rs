//! The embedding provider contract (§4.6 `[AMBIENT]`): turning a text
//! surface into a fixed-dimension vector, implemented either locally or by
//! a remote HTTP backend.

use crate::error::VectorResult;

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector of `dimensions()` length.
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}
