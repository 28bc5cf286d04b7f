//! Embedding memoization cache (§4.6 `[AMBIENT]`): memoizes embedding
//! vectors by the content hash of the text surface that was embedded, so
//! re-ingesting an unchanged document never re-calls the embedding
//! provider.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

pub struct EmbeddingCache {
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        EmbeddingCache { entries: HashMap::new() }
    }

    pub fn get(&self, text: &str) -> Option<&Vec<f32>> {
        self.entries.get(&content_hash(text))
    }

    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        self.entries.insert(content_hash(text), vector);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { total_entries: self.entries.len() }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_by_content_hash_not_identity() {
        let mut cache = EmbeddingCache::new();
        cache.insert("customer table", vec![1.0, 0.0]);
        assert_eq!(cache.get("customer table"), Some(&vec![1.0, 0.0]));
        assert_eq!(cache.get("other table"), None);
        assert_eq!(cache.stats().total_entries, 1);
    }
}
