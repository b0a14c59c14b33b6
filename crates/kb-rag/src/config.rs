//! Configuration for the knowledge-base pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Vector index backend (memory or pinecone)
    #[serde(default)]
    pub backend: IndexBackend,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Background processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,
    /// Pinecone configuration (required when backend = pinecone)
    #[serde(default)]
    pub pinecone: Option<PineconeConfig>,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.dimensions == 0 {
            return Err(Error::Config("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".into()));
        }
        if self.backend == IndexBackend::Pinecone && self.pinecone.is_none() {
            return Err(Error::Config(
                "backend = pinecone requires a [pinecone] section".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.diversity_threshold) {
            return Err(Error::Config(
                "retrieval.diversity_threshold must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// In-process index (reference and test backend)
    #[default]
    Memory,
    /// Pinecone-compatible REST index
    Pinecone,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Validate size/overlap relationship
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(
                "chunking.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        Ok(())
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Vector dimensions; must match the vector index's configured dimension
    pub dimensions: usize,
    /// Number of texts per batch window
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Character ceiling for a single input
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Request timeout in seconds
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_max_input_chars() -> usize {
    32_000
}

fn default_embed_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: default_batch_size(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_embed_timeout(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to target per query
    pub top_k: usize,
    /// Minimum similarity score for candidates
    pub min_score: f32,
    /// Token budget for the assembled context
    pub max_tokens: u32,
    /// Jaccard similarity above which a candidate is considered a near-duplicate
    pub diversity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.7,
            max_tokens: 4000,
            diversity_threshold: 0.85,
        }
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of documents processed in parallel (default: CPU count, max 4)
    pub parallel_documents: Option<usize>,
    /// Job queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1000
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ProcessingConfig {
    /// Resolved parallel document count
    pub fn parallel_documents(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite metadata database path
    pub database_path: PathBuf,
    /// Local blob store directory
    pub blob_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("kb-rag");

        Self {
            database_path: data_dir.join("metadata.db"),
            blob_dir: data_dir.join("blobs"),
        }
    }
}

/// Pinecone-compatible index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Index host, e.g. "https://my-index-abc123.svc.us-east-1.pinecone.io"
    pub index_host: String,
    /// API key
    pub api_key: String,
    /// Namespace for all vectors (default: "")
    #[serde(default)]
    pub namespace: String,
    /// Character cap applied to the content field of vector metadata
    #[serde(default = "default_metadata_content_limit")]
    pub metadata_content_limit: usize,
}

fn default_metadata_content_limit() -> usize {
    1000
}
