//! Provider traits and implementations for external collaborators
//!
//! The pipeline consumes an embedding provider, a vector index, and a blob
//! store through the traits in this module. Each trait ships with at least
//! one implementation usable out of the box.

pub mod blob_store;
pub mod embedding;
pub mod memory;
pub mod ollama;
pub mod pinecone;
pub mod vector_index;

pub use blob_store::{BlobStore, LocalBlobStore, StoredBlob};
pub use embedding::EmbeddingProvider;
pub use memory::MemoryVectorIndex;
pub use ollama::OllamaEmbedder;
pub use pinecone::PineconeIndex;
pub use vector_index::{
    VectorFilter, VectorIndexProvider, VectorMatch, VectorMetadata, VectorRecord,
    FIELD_DOCUMENT_ID, FIELD_KNOWLEDGE_BASE_ID,
};

use std::sync::Arc;

use crate::config::{IndexBackend, PipelineConfig};
use crate::embedding::EmbeddingGenerator;
use crate::error::{Error, Result};

/// Build the vector index selected by configuration
pub fn build_vector_index(config: &PipelineConfig) -> Result<Arc<dyn VectorIndexProvider>> {
    match config.backend {
        IndexBackend::Memory => Ok(Arc::new(MemoryVectorIndex::new())),
        IndexBackend::Pinecone => {
            let pinecone = config.pinecone.as_ref().ok_or_else(|| {
                Error::Config("backend = pinecone requires a [pinecone] section".into())
            })?;
            Ok(Arc::new(PineconeIndex::new(
                pinecone,
                config.embedding.dimensions,
            )?))
        }
    }
}

/// Build the embedding generator over the configured provider
pub fn build_embedding_generator(config: &PipelineConfig) -> Result<EmbeddingGenerator> {
    let provider = Arc::new(OllamaEmbedder::new(&config.embedding)?);
    Ok(EmbeddingGenerator::new(provider, &config.embedding))
}
