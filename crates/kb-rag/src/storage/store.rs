//! Metadata store trait

use uuid::Uuid;

use crate::error::Result;
use crate::types::{Chunk, Document, DocumentStatus, KnowledgeBase};

/// Relational metadata store consumed by the pipeline
///
/// Operations are synchronous; implementations are expected to be embedded
/// or fast enough to call directly from async code. Chunk insertion is the
/// publish point: a batch lands atomically or not at all, so readers never
/// observe a partial chunk set.
pub trait MetadataStore: Send + Sync {
    /// Create a knowledge base
    fn create_knowledge_base(&self, kb: &KnowledgeBase) -> Result<()>;

    /// Read a knowledge base
    fn get_knowledge_base(&self, id: Uuid) -> Result<Option<KnowledgeBase>>;

    /// Delete a knowledge base with all member documents and chunks
    ///
    /// Returns the number of documents removed.
    fn delete_knowledge_base(&self, id: Uuid) -> Result<usize>;

    /// Create a document
    fn create_document(&self, document: &Document) -> Result<()>;

    /// Read a document
    fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// List documents of a knowledge base
    fn list_documents(&self, knowledge_base_id: Uuid) -> Result<Vec<Document>>;

    /// Update a document's status and error message
    fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Record the blob URL once bytes are durably stored
    fn update_document_blob(&self, id: Uuid, blob_url: &str) -> Result<()>;

    /// Insert a document's chunks as one atomic batch
    fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Read chunks by their vector index identifiers
    fn chunks_by_vector_ids(&self, vector_ids: &[String]) -> Result<Vec<Chunk>>;

    /// Read all chunks of a document, ordered by chunk index
    fn chunks_by_document(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    /// Delete all chunks of a document, returning the count removed
    fn delete_chunks_by_document(&self, document_id: Uuid) -> Result<usize>;

    /// Delete a document with its chunks
    fn delete_document(&self, id: Uuid) -> Result<()>;
}
