//! Deterministic, dependency-free embedding provider (§4.6 `[AMBIENT]`):
//! hashes each character trigram of the (lowercased, whitespace-collapsed)
//! input text into a fixed-size bucket, then L2-normalizes. No network
//! calls, no model weights — the default provider and what tests run
//! against.

use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;
use crate::error::VectorResult;

pub const DEFAULT_DIMENSIONS: usize = 256;

pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    pub fn new() -> Self {
        LocalEmbeddingProvider { dimensions: DEFAULT_DIMENSIONS }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        LocalEmbeddingProvider { dimensions }
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        Ok(hashed_trigram_vector(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "local-hashed-trigram"
    }
}

fn hashed_trigram_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let normalized = text.trim().to_lowercase();
    let normalized: String = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = normalized.chars().collect();

    let mut buckets = vec![0f32; dimensions];
    if chars.len() < 3 {
        if !chars.is_empty() {
            let idx = bucket_index(&normalized, dimensions);
            buckets[idx] += 1.0;
        }
    } else {
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let idx = bucket_index(&trigram, dimensions);
            buckets[idx] += 1.0;
        }
    }

    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in &mut buckets {
            *b /= norm;
        }
    }
    buckets
}

fn bucket_index(s: &str, dimensions: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (value as usize) % dimensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let provider = LocalEmbeddingProvider::new();
        let a = provider.embed("staging.customer_raw").await.unwrap();
        let b = provider.embed("staging.customer_raw").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_is_unit_length_when_nonempty() {
        let provider = LocalEmbeddingProvider::new();
        let v = provider.embed("customer data pipeline").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn similar_text_yields_closer_vectors_than_dissimilar_text() {
        let provider = LocalEmbeddingProvider::new();
        let a = provider.embed("customer master file").await.unwrap();
        let b = provider.embed("customer master table").await.unwrap();
        let c = provider.embed("completely unrelated topic xyz").await.unwrap();

        let cos = |x: &[f32], y: &[f32]| -> f32 { x.iter().zip(y).map(|(a, b)| a * b).sum() };
        assert!(cos(&a, &b) > cos(&a, &c));
    }
}
