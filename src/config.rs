//! Application configuration (§6, §2 `[AMBIENT]`): plain `Default`-able
//! structs overridable by a `traceai.toml` file in the target root. CLI
//! flags win over the file, the file wins over built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use traceai_parsers::IngestConfig;
use traceai_vector::IndexConfig;

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    ingest: Option<FileIngestConfig>,
    server: Option<FileServerConfig>,
    embedding: Option<FileEmbeddingConfig>,
    hnsw: Option<FileHnswConfig>,
    persist_dir: Option<String>,
    max_traversal_nodes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileIngestConfig {
    max_concurrent_parsers: Option<usize>,
    patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileServerConfig {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileEmbeddingConfig {
    provider: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileHnswConfig {
    m: Option<usize>,
    ef_construction: Option<usize>,
    ef_search: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings { host: "127.0.0.1".to_string(), port: 7890 }
    }
}

#[derive(Debug, Clone)]
pub enum EmbeddingProviderChoice {
    Local,
    Remote { base_url: String, model: String },
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderChoice,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        EmbeddingSettings {
            provider: EmbeddingProviderChoice::Local,
            dimensions: traceai_vector::providers::local::DEFAULT_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub server: ServerSettings,
    pub embedding: EmbeddingSettings,
    pub hnsw: IndexConfig,
    pub persist_dir: PathBuf,
    pub max_traversal_nodes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            ingest: IngestConfig::default(),
            server: ServerSettings::default(),
            embedding: EmbeddingSettings::default(),
            hnsw: IndexConfig::default(),
            persist_dir: PathBuf::from(".traceai"),
            max_traversal_nodes: traceai_core::DEFAULT_MAX_VISITED,
        }
    }
}

/// Loads `root/traceai.toml` if present, layering it over built-in
/// defaults. Malformed config is a hard error (§7 `InvalidArgument`), not a
/// silent fallback, since a typo'd config should never be mistaken for "no
/// config".
pub fn load(root: &Path) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::default();
    let path = root.join("traceai.toml");
    if !path.exists() {
        return Ok(config);
    }

    let raw = std::fs::read_to_string(&path)?;
    let file: FileConfig = toml::from_str(&raw)?;

    if let Some(ingest) = file.ingest {
        if let Some(n) = ingest.max_concurrent_parsers {
            config.ingest.max_concurrent_parsers = n;
        }
        if let Some(patterns) = ingest.patterns {
            config.ingest.patterns = patterns;
        }
    }
    if let Some(server) = file.server {
        if let Some(host) = server.host {
            config.server.host = host;
        }
        if let Some(port) = server.port {
            config.server.port = port;
        }
    }
    if let Some(embedding) = file.embedding {
        if let (Some(base_url), Some(model)) = (embedding.base_url.clone(), embedding.model.clone()) {
            if embedding.provider.as_deref() == Some("remote") {
                config.embedding.provider = EmbeddingProviderChoice::Remote { base_url, model };
            }
        }
        if let Some(dimensions) = embedding.dimensions {
            config.embedding.dimensions = dimensions;
        }
    }
    if let Some(hnsw) = file.hnsw {
        if let Some(m) = hnsw.m {
            config.hnsw.m = m;
        }
        if let Some(ef_construction) = hnsw.ef_construction {
            config.hnsw.ef_construction = ef_construction;
        }
        if let Some(ef_search) = hnsw.ef_search {
            config.hnsw.ef_search = ef_search;
        }
    }
    if let Some(persist_dir) = file.persist_dir {
        config.persist_dir = root.join(persist_dir);
    } else {
        config.persist_dir = root.join(&config.persist_dir);
    }
    if let Some(max_traversal_nodes) = file.max_traversal_nodes {
        config.max_traversal_nodes = max_traversal_nodes;
    }

    Ok(config)
}
