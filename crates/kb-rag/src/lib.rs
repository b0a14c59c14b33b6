//! kb-rag: knowledge-base retrieval pipeline for conversational AI
//!
//! Turns uploaded files into searchable vector representations and, at query
//! time, assembles a deduplicated, token-budgeted context with source
//! attribution. Ingestion runs detached from the upload request; a
//! document's status column is the only externally observable progress
//! signal.
//!
//! The pipeline consumes four collaborators through traits: a blob store, a
//! relational metadata store, an embedding provider, and a vector index.
//! Working implementations ship for all four (local filesystem, SQLite,
//! Ollama, and an in-process or Pinecone-compatible index).

pub mod config;
pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::{ChunkingConfig, EmbeddingConfig, PipelineConfig, RetrievalConfig};
pub use embedding::EmbeddingGenerator;
pub use error::{Error, Result};
pub use ingestion::{TextChunker, TextExtractor};
pub use processing::{IngestQueue, IngestWorker, Ingestor};
pub use retrieval::{augment_prompt, RetrievalEngine, RetrievedContext};
pub use types::{Chunk, Document, DocumentStatus, KnowledgeBase, Visibility};
