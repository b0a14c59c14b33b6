//! Ingestion orchestrator: the per-document state machine
//!
//! `uploading -> processing -> ready | failed`, with an operator-only
//! `failed -> processing` reprocessing edge. Step failures inside the
//! pipeline are captured into the document's `failed` status and never
//! re-thrown; chunk rows are published in one atomic batch.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingGenerator;
use crate::error::{Error, Result};
use crate::ingestion::{TextChunker, TextExtractor};
use crate::providers::{
    BlobStore, VectorFilter, VectorIndexProvider, VectorMetadata, VectorRecord,
};
use crate::storage::MetadataStore;
use crate::types::{Chunk, ChunkPosition, Document, DocumentStatus};

/// Drives documents through fetch, extract, chunk, embed, and store
pub struct Ingestor {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn VectorIndexProvider>,
    embedder: EmbeddingGenerator,
    chunking: ChunkingConfig,
}

impl Ingestor {
    /// Create an ingestor
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        index: Arc<dyn VectorIndexProvider>,
        embedder: EmbeddingGenerator,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            index,
            embedder,
            chunking,
        }
    }

    /// Accept an upload: store bytes durably and create the document row
    ///
    /// Returns once the document is in `processing`; the caller submits it
    /// to the ingest queue and observes completion by polling status.
    pub async fn accept_upload(
        &self,
        knowledge_base_id: Uuid,
        original_name: &str,
        mime_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Document> {
        self.store
            .get_knowledge_base(knowledge_base_id)?
            .ok_or_else(|| Error::not_found(format!("knowledge base {}", knowledge_base_id)))?;

        let mime = match mime_type {
            Some(m) if m != "application/octet-stream" => m.to_string(),
            _ => TextExtractor::detect_mime(original_name),
        };

        let content_hash = hex::encode(Sha256::digest(bytes));
        let extension = std::path::Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);

        let mut document = Document::new(
            knowledge_base_id,
            stored_name.clone(),
            original_name,
            mime,
            bytes.len() as u64,
            content_hash,
        );
        self.store.create_document(&document)?;

        // An upload failure is caller-visible: remove the row and propagate
        // instead of leaving a stuck `uploading` document behind.
        let blob = match self.blobs.put(&stored_name, bytes).await {
            Ok(blob) => blob,
            Err(e) => {
                if let Err(cleanup) = self.store.delete_document(document.id) {
                    tracing::error!(
                        "failed to remove document {} after blob failure: {}",
                        document.id,
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        self.store.update_document_blob(document.id, &blob.url)?;
        self.store
            .update_document_status(document.id, DocumentStatus::Processing, None)?;

        document.blob_url = Some(blob.url);
        document.status = DocumentStatus::Processing;

        tracing::info!(
            "[{}] upload accepted ({} bytes), document {} ready for processing",
            original_name,
            bytes.len(),
            document.id
        );
        Ok(document)
    }

    /// Run the pipeline for a document in `processing`
    ///
    /// Pipeline errors are recorded as the document's `failed` status; the
    /// returned error covers only surrounding failures (unknown document,
    /// metadata store unavailable).
    pub async fn process_document(&self, document_id: Uuid) -> Result<DocumentStatus> {
        let document = self
            .store
            .get_document(document_id)?
            .ok_or_else(|| Error::not_found(format!("document {}", document_id)))?;

        if document.status != DocumentStatus::Processing {
            return Err(Error::InvalidTransition(format!(
                "document {} is {}, expected processing",
                document_id, document.status
            )));
        }

        match self.run_pipeline(&document).await {
            Ok(chunk_count) => {
                self.store
                    .update_document_status(document_id, DocumentStatus::Ready, None)?;
                tracing::info!(
                    "[{}] ready: {} chunks committed",
                    document.original_name,
                    chunk_count
                );
                Ok(DocumentStatus::Ready)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("[{}] ingestion failed: {}", document.original_name, message);
                self.cleanup_partial_state(document_id).await;
                self.store.update_document_status(
                    document_id,
                    DocumentStatus::Failed,
                    Some(&message),
                )?;
                Ok(DocumentStatus::Failed)
            }
        }
    }

    /// Steps 1-6: fetch, extract, chunk, embed, upsert vectors, persist chunks
    async fn run_pipeline(&self, document: &Document) -> Result<usize> {
        let blob_url = document
            .blob_url
            .as_deref()
            .ok_or_else(|| Error::not_found(format!("blob for document {}", document.id)))?;

        let bytes = self.blobs.fetch(blob_url).await?;

        let extracted = TextExtractor::extract(&bytes, &document.mime_type)?;
        tracing::debug!(
            "[{}] extracted {} characters",
            document.original_name,
            extracted.text.len()
        );

        let chunker = TextChunker::from_config(&self.chunking);
        let splits = chunker.split(&extracted.text)?;
        if splits.is_empty() {
            return Err(Error::EmptyContent);
        }
        tracing::info!(
            "[{}] created {} chunks, generating embeddings",
            document.original_name,
            splits.len()
        );

        let texts: Vec<String> = splits.iter().map(|s| s.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let now = chrono::Utc::now();
        let records: Vec<VectorRecord> = splits
            .iter()
            .zip(vectors)
            .map(|(split, vector)| VectorRecord {
                id: format!("{}-{}", document.id, split.index),
                vector,
                metadata: VectorMetadata {
                    document_id: document.id,
                    knowledge_base_id: document.knowledge_base_id,
                    chunk_index: split.index,
                    content: split.content.clone(),
                    file_name: document.original_name.clone(),
                    token_count: split.token_count,
                    created_at: now,
                },
            })
            .collect();

        let vector_ids = self.index.upsert(records).await?;
        if vector_ids.len() != splits.len() {
            return Err(Error::vector_store(format!(
                "upsert returned {} ids for {} vectors",
                vector_ids.len(),
                splits.len()
            )));
        }

        let chunks: Vec<Chunk> = splits
            .iter()
            .zip(&vector_ids)
            .map(|(split, vector_id)| {
                Chunk::new(
                    document.id,
                    split.content.clone(),
                    split.index,
                    split.token_count,
                    vector_id.clone(),
                    ChunkPosition {
                        char_start: split.char_start,
                        char_end: split.char_end,
                        page: split.page,
                        section: None,
                    },
                )
            })
            .collect();

        self.store.insert_chunks(&chunks)?;
        Ok(chunks.len())
    }

    /// Remove chunk rows and vectors left behind by a failed pipeline run
    ///
    /// This is the self-heal path for the vector/chunk invariant: after it
    /// runs, a failed document has zero chunks and no reachable vectors.
    async fn cleanup_partial_state(&self, document_id: Uuid) {
        if let Err(e) = self.store.delete_chunks_by_document(document_id) {
            tracing::error!("failed to clear chunks of document {}: {}", document_id, e);
        }
        if let Err(e) = self
            .index
            .delete_by_filter(&VectorFilter::document(document_id))
            .await
        {
            tracing::error!("failed to clear vectors of document {}: {}", document_id, e);
        }
    }

    /// Reset a failed document to `processing` for another attempt
    ///
    /// Operator-triggered; the caller re-submits the document to the queue.
    /// Stale chunks and vectors from the failed attempt are removed first,
    /// so a repeat failure can never accumulate duplicate rows.
    pub async fn reprocess(&self, document_id: Uuid) -> Result<Document> {
        let document = self
            .store
            .get_document(document_id)?
            .ok_or_else(|| Error::not_found(format!("document {}", document_id)))?;

        if document.status != DocumentStatus::Failed {
            return Err(Error::InvalidTransition(format!(
                "document {} is {}, only failed documents can be reprocessed",
                document_id, document.status
            )));
        }

        self.cleanup_partial_state(document_id).await;
        self.store
            .update_document_status(document_id, DocumentStatus::Processing, None)?;

        self.store
            .get_document(document_id)?
            .ok_or_else(|| Error::not_found(format!("document {}", document_id)))
    }

    /// Delete a document with its chunks and vectors
    ///
    /// Vector deletion is best-effort: a vector-store failure is logged and
    /// metadata deletion proceeds regardless.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        self.store
            .get_document(document_id)?
            .ok_or_else(|| Error::not_found(format!("document {}", document_id)))?;

        if let Err(e) = self
            .index
            .delete_by_filter(&VectorFilter::document(document_id))
            .await
        {
            tracing::warn!(
                "vector deletion for document {} failed, continuing: {}",
                document_id,
                e
            );
        }

        self.store.delete_document(document_id)
    }

    /// Delete a knowledge base with all member documents, chunks, and vectors
    pub async fn delete_knowledge_base(&self, knowledge_base_id: Uuid) -> Result<usize> {
        self.store
            .get_knowledge_base(knowledge_base_id)?
            .ok_or_else(|| Error::not_found(format!("knowledge base {}", knowledge_base_id)))?;

        if let Err(e) = self
            .index
            .delete_by_filter(&VectorFilter::knowledge_base(knowledge_base_id))
            .await
        {
            tracing::warn!(
                "vector deletion for knowledge base {} failed, continuing: {}",
                knowledge_base_id,
                e
            );
        }

        self.store.delete_knowledge_base(knowledge_base_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::providers::{EmbeddingProvider, LocalBlobStore, MemoryVectorIndex};
    use crate::storage::SqliteMetadataStore;
    use crate::types::KnowledgeBase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubEmbedder {
        dimensions: usize,
        fail: AtomicBool,
    }

    impl StubEmbedder {
        fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::embedding("stub offline"));
            }
            let mut v = vec![0.1; self.dimensions];
            v[0] = (text.len() % 97) as f32 + 1.0;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn max_input_chars(&self) -> usize {
            100_000
        }

        async fn health_check(&self) -> crate::error::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct Fixture {
        ingestor: Ingestor,
        store: Arc<SqliteMetadataStore>,
        index: Arc<MemoryVectorIndex>,
        embedder: Arc<StubEmbedder>,
        kb: KnowledgeBase,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let blobs = Arc::new(LocalBlobStore::new(dir.path()).unwrap());
        let index = Arc::new(MemoryVectorIndex::new());
        let embedder = Arc::new(StubEmbedder::new(8));
        let generator = EmbeddingGenerator::new(embedder.clone(), &EmbeddingConfig::default());

        let kb = KnowledgeBase::new(Uuid::new_v4(), "test kb");
        store.create_knowledge_base(&kb).unwrap();

        let ingestor = Ingestor::new(
            store.clone(),
            blobs,
            index.clone(),
            generator,
            ChunkingConfig {
                chunk_size: 200,
                chunk_overlap: 40,
            },
        );

        Fixture {
            ingestor,
            store,
            index,
            embedder,
            kb,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_happy_path_to_ready() {
        let f = fixture();
        let text = "A sentence about storage. ".repeat(40);

        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "notes.txt", Some("text/plain"), text.as_bytes())
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);

        let status = f.ingestor.process_document(doc.id).await.unwrap();
        assert_eq!(status, DocumentStatus::Ready);

        let chunks = f.store.chunks_by_document(doc.id).unwrap();
        assert!(!chunks.is_empty());
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<u32> = (0..chunks.len() as u32).collect();
        assert_eq!(indices, expected);
        assert_eq!(f.index.len(), chunks.len());
    }

    #[tokio::test]
    async fn test_unknown_knowledge_base_rejected() {
        let f = fixture();
        let err = f
            .ingestor
            .accept_upload(Uuid::new_v4(), "notes.txt", Some("text/plain"), b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_document() {
        let f = fixture();
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "img.png", Some("image/png"), b"\x89PNG")
            .await
            .unwrap();

        let status = f.ingestor.process_document(doc.id).await.unwrap();
        assert_eq!(status, DocumentStatus::Failed);

        let stored = f.store.get_document(doc.id).unwrap().unwrap();
        assert!(stored.error_message.unwrap().contains("Unsupported format"));
        assert!(f.store.chunks_by_document(doc.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_no_partial_state() {
        let f = fixture();
        let text = "Interesting facts about bees. ".repeat(30);
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "bees.txt", Some("text/plain"), text.as_bytes())
            .await
            .unwrap();

        f.embedder.fail.store(true, Ordering::SeqCst);
        let status = f.ingestor.process_document(doc.id).await.unwrap();

        assert_eq!(status, DocumentStatus::Failed);
        assert!(f.store.chunks_by_document(doc.id).unwrap().is_empty());
        assert_eq!(f.index.len(), 0);
    }

    #[tokio::test]
    async fn test_reprocess_failed_then_succeed() {
        let f = fixture();
        let text = "Interesting facts about bees. ".repeat(30);
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "bees.txt", Some("text/plain"), text.as_bytes())
            .await
            .unwrap();

        f.embedder.fail.store(true, Ordering::SeqCst);
        f.ingestor.process_document(doc.id).await.unwrap();

        f.embedder.fail.store(false, Ordering::SeqCst);
        let reset = f.ingestor.reprocess(doc.id).await.unwrap();
        assert_eq!(reset.status, DocumentStatus::Processing);

        let status = f.ingestor.process_document(doc.id).await.unwrap();
        assert_eq!(status, DocumentStatus::Ready);
        assert!(!f.store.chunks_by_document(doc.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_failure_is_idempotent() {
        let f = fixture();
        let text = "More text to embed later. ".repeat(30);
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "later.txt", Some("text/plain"), text.as_bytes())
            .await
            .unwrap();

        f.embedder.fail.store(true, Ordering::SeqCst);
        f.ingestor.process_document(doc.id).await.unwrap();
        f.ingestor.reprocess(doc.id).await.unwrap();
        f.ingestor.process_document(doc.id).await.unwrap();

        let stored = f.store.get_document(doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(stored.error_message.is_some());
        assert!(f.store.chunks_by_document(doc.id).unwrap().is_empty());
        assert_eq!(f.index.len(), 0);
    }

    #[tokio::test]
    async fn test_reprocess_requires_failed_status() {
        let f = fixture();
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "a.txt", Some("text/plain"), b"short doc")
            .await
            .unwrap();

        let err = f.ingestor.reprocess(doc.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_delete_document_removes_vectors() {
        let f = fixture();
        let text = "Content scheduled for deletion. ".repeat(30);
        let doc = f
            .ingestor
            .accept_upload(f.kb.id, "gone.txt", Some("text/plain"), text.as_bytes())
            .await
            .unwrap();
        f.ingestor.process_document(doc.id).await.unwrap();
        assert!(f.index.len() > 0);

        f.ingestor.delete_document(doc.id).await.unwrap();

        assert!(f.store.get_document(doc.id).unwrap().is_none());
        assert_eq!(f.index.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_knowledge_base_cascades() {
        let f = fixture();
        for name in ["one.txt", "two.txt"] {
            let text = format!("Document named {}. ", name).repeat(30);
            let doc = f
                .ingestor
                .accept_upload(f.kb.id, name, Some("text/plain"), text.as_bytes())
                .await
                .unwrap();
            f.ingestor.process_document(doc.id).await.unwrap();
        }
        assert!(f.index.len() > 0);

        let removed = f.ingestor.delete_knowledge_base(f.kb.id).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(f.index.len(), 0);
        assert!(f.store.get_knowledge_base(f.kb.id).unwrap().is_none());
    }
}
