//! HNSW-backed semantic vector index (§4.6): vectors are stored in a side
//! table keyed by node id, and the `hnsw_rs` graph is rebuilt from that
//! table on every mutation (favoring correctness over a batched-rebuild
//! optimization, since ingestion already batches upserts at the
//! document-commit granularity). Persistence saves the vectors rather than
//! the graph topology, reconstructing the HNSW structure on load.
//!
//! The index is authoritative only for discovery (semantic_search). It is
//! always rebuildable from the graph, so a corrupt or missing persisted
//! copy is not a data-loss event, only a re-embedding cost.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::DistCosine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use traceai_core::model::NodeId;

use crate::embedding::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};

/// Schema version for the on-disk vector store; bumped on incompatible
/// format changes, mirroring `traceai_core::persist::SCHEMA_VERSION`.
pub const SCHEMA_VERSION: u32 = 1;

/// A metadata-equality predicate for `similarity_search`: every key/value
/// pair present must match the candidate's metadata exactly.
pub type Filter = BTreeMap<String, Value>;
pub type Metadata = BTreeMap<String, Value>;

struct Entry {
    id: NodeId,
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Tunable HNSW construction/search parameters.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig { m: 16, ef_construction: 200, ef_search: 64 }
    }
}

/// The built HNSW graph plus the vectors it was built from. The vectors
/// must outlive the graph since `hnsw_rs` stores references into them;
/// wrapping both together and always replacing them as a unit keeps that
/// invariant from being observable at the call site.
struct BuiltGraph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    // Kept alive only to satisfy the 'static borrow above; never read back.
    _vectors: Box<[Vec<f32>]>,
    // hnsw internal index -> position in `entries`.
    internal_to_entry: Vec<usize>,
}

pub struct VectorIndex {
    config: IndexConfig,
    entries: RwLock<Vec<Option<Entry>>>,
    built: RwLock<Option<BuiltGraph>>,
    dimensions: RwLock<usize>,
}

impl VectorIndex {
    pub fn new(config: IndexConfig) -> Self {
        VectorIndex {
            config,
            entries: RwLock::new(Vec::new()),
            built: RwLock::new(None),
            dimensions: RwLock::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embeds `text` with `provider` and inserts/replaces the vector under
    /// `id`. Idempotent: re-upserting the same id replaces its prior vector
    /// and metadata rather than accumulating duplicates.
    pub async fn upsert(
        &self,
        id: NodeId,
        text: &str,
        metadata: Metadata,
        provider: &dyn EmbeddingProvider,
    ) -> VectorResult<()> {
        let vector = provider.embed(text).await?;
        if vector.is_empty() {
            return Err(VectorError::InvalidArgument("embedding provider returned an empty vector".into()));
        }
        {
            let mut dim = self.dimensions.write().unwrap();
            if *dim == 0 {
                *dim = vector.len();
            } else if *dim != vector.len() {
                return Err(VectorError::InvalidArgument(format!(
                    "embedding dimension mismatch: index has {}, got {}",
                    *dim,
                    vector.len()
                )));
            }
        }

        let mut entries = self.entries.write().unwrap();
        if let Some(slot) = entries.iter_mut().find(|e| matches!(e, Some(entry) if entry.id == id)) {
            *slot = Some(Entry { id, vector, metadata });
        } else {
            entries.push(Some(Entry { id, vector, metadata }));
        }
        drop(entries);
        self.rebuild()
    }

    /// Removes `id` if present. A no-op if `id` was never upserted.
    pub fn delete(&self, id: &NodeId) -> VectorResult<()> {
        let mut entries = self.entries.write().unwrap();
        let mut found = false;
        for slot in entries.iter_mut() {
            if matches!(slot, Some(entry) if &entry.id == id) {
                *slot = None;
                found = true;
            }
        }
        drop(entries);
        if found {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Cosine-similarity top-k search. `filter`, when present, restricts
    /// candidates to those whose metadata contains every key/value pair in
    /// the filter. Scores are monotone-decreasing (1.0 = identical
    /// direction, -1.0 = opposite).
    pub fn similarity_search(&self, query_vector: &[f32], k: usize, filter: Option<&Filter>) -> Vec<(NodeId, f32, Metadata)> {
        if k == 0 {
            return Vec::new();
        }
        let built_guard = self.built.read().unwrap();
        let Some(built) = built_guard.as_ref() else {
            return Vec::new();
        };
        let entries = self.entries.read().unwrap();

        // Over-fetch so post-filtering by metadata still yields k results
        // when some candidates are excluded.
        let fetch_k = if filter.is_some() { (k * 8).max(k) } else { k };
        let raw = built.hnsw.search(query_vector, fetch_k, self.config.ef_search);

        let mut results: Vec<(NodeId, f32, Metadata)> = Vec::new();
        for neighbour in raw {
            let Some(&entry_idx) = built.internal_to_entry.get(neighbour.d_id) else { continue };
            let Some(entry) = entries.get(entry_idx).and_then(|e| e.as_ref()) else { continue };
            if let Some(filter) = filter {
                if !matches_filter(&entry.metadata, filter) {
                    continue;
                }
            }
            // hnsw_rs DistCosine returns 1 - cosine_similarity.
            let score = 1.0 - neighbour.distance;
            results.push((entry.id.clone(), score, entry.metadata.clone()));
        }
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    fn rebuild(&self) -> VectorResult<()> {
        let entries = self.entries.read().unwrap();
        let active: Vec<(usize, &Entry)> = entries
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|e| (idx, e)))
            .collect();

        if active.is_empty() {
            *self.built.write().unwrap() = None;
            return Ok(());
        }

        let vectors: Vec<Vec<f32>> = active.iter().map(|(_, e)| e.vector.clone()).collect();
        let internal_to_entry: Vec<usize> = active.iter().map(|(idx, _)| *idx).collect();
        let vectors: Box<[Vec<f32>]> = vectors.into_boxed_slice();

        // SAFETY: `vectors` is moved into `BuiltGraph::_vectors` right after
        // the HNSW graph is populated from it, and both are replaced as a
        // single unit under `self.built`'s write lock, so the graph never
        // outlives the data it borrows.
        let vectors_ref: &'static [Vec<f32>] = unsafe { std::slice::from_raw_parts(vectors.as_ptr(), vectors.len()) };

        let max_elements = vectors_ref.len();
        let max_layer = if max_elements <= 1 {
            4
        } else {
            let m = (self.config.m as f64).max(2.0);
            let layers = ((max_elements as f64).ln() / m.ln()).ceil() as usize;
            layers.clamp(4, 16)
        };

        let mut hnsw: Hnsw<'static, f32, DistCosine> =
            Hnsw::new(self.config.m, max_elements, max_layer, self.config.ef_construction, DistCosine);
        hnsw.set_keeping_pruned(true);

        for (internal_idx, vector) in vectors_ref.iter().enumerate() {
            hnsw.insert((vector, internal_idx));
        }

        *self.built.write().unwrap() = Some(BuiltGraph { hnsw, _vectors: vectors, internal_to_entry });
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        *self.dimensions.read().unwrap()
    }
}

fn matches_filter(metadata: &Metadata, filter: &Filter) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    schema_version: u32,
    dimensions: usize,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    id: NodeId,
    vector: Vec<f32>,
    metadata: Metadata,
}

impl VectorIndex {
    /// Writes the vector store to `dir/vectors.json`. The HNSW graph
    /// topology is not persisted; it is rebuilt from the saved vectors on
    /// load, exactly as the graph-snapshot reader rebuilds lookups from the
    /// persisted node/edge list rather than storing derived structures.
    pub fn save(&self, dir: &Path) -> VectorResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| VectorError::Internal(format!("create persist dir: {e}")))?;
        let entries = self.entries.read().unwrap();
        let persisted = PersistedIndex {
            schema_version: SCHEMA_VERSION,
            dimensions: *self.dimensions.read().unwrap(),
            entries: entries
                .iter()
                .filter_map(|slot| slot.as_ref())
                .map(|e| PersistedEntry { id: e.id.clone(), vector: e.vector.clone(), metadata: e.metadata.clone() })
                .collect(),
        };
        let json = serde_json::to_string(&persisted).map_err(|e| VectorError::Internal(format!("serialize vector store: {e}")))?;

        let tmp_path = dir.join("vectors.json.tmp");
        let final_path = dir.join("vectors.json");
        std::fs::write(&tmp_path, &json).map_err(|e| VectorError::Internal(format!("write vector store: {e}")))?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| VectorError::Internal(format!("finalize vector store: {e}")))?;
        Ok(())
    }

    /// Loads a previously saved vector store, rebuilding the HNSW graph
    /// from the saved vectors. Older `schema_version`s are accepted, as
    /// long as the shape below is unchanged (forward-compatible reader).
    pub fn load(dir: &Path, config: IndexConfig) -> VectorResult<Self> {
        let path = dir.join("vectors.json");
        let json = std::fs::read_to_string(&path).map_err(|e| VectorError::Internal(format!("read vector store: {e}")))?;
        let persisted: PersistedIndex =
            serde_json::from_str(&json).map_err(|e| VectorError::Internal(format!("parse vector store: {e}")))?;
        if persisted.schema_version > SCHEMA_VERSION {
            return Err(VectorError::Internal(format!(
                "vector store schema_version {} is newer than supported {}",
                persisted.schema_version, SCHEMA_VERSION
            )));
        }

        let index = VectorIndex::new(config);
        *index.dimensions.write().unwrap() = persisted.dimensions;
        *index.entries.write().unwrap() = persisted
            .entries
            .into_iter()
            .map(|e| Some(Entry { id: e.id, vector: e.vector, metadata: e.metadata }))
            .collect();
        index.rebuild()?;
        Ok(index)
    }

    pub fn persisted_exists(dir: &Path) -> bool {
        dir.join("vectors.json").exists()
    }
}
