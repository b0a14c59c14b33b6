//! Document and chunk types with position tracking for citations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document processing status
///
/// Transitions move forward only: `uploading -> processing -> ready | failed`.
/// The single backward edge, `failed -> processing`, is operator-triggered
/// reprocessing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Bytes accepted, not yet durably stored
    Uploading,
    /// Pipeline running (fetch, extract, chunk, embed, store)
    Processing,
    /// Chunks and vectors committed
    Ready,
    /// Pipeline failed; error message set, no chunks visible
    Failed,
}

impl DocumentStatus {
    /// Whether the pipeline has finished with this document
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Whether a transition to `next` is allowed
    pub fn can_transition(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Uploading, Self::Processing)
                | (Self::Processing, Self::Ready)
                | (Self::Processing, Self::Failed)
                | (Self::Failed, Self::Processing)
        )
    }

    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored string form
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "uploading" => Self::Uploading,
            "processing" => Self::Processing,
            "ready" => Self::Ready,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded document belonging to a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Parent knowledge base ID
    pub knowledge_base_id: Uuid,
    /// Internal stored file name (unique per upload)
    pub stored_name: String,
    /// Original file name as uploaded by the user
    pub original_name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Processing status
    pub status: DocumentStatus,
    /// Error message when status is `failed`
    pub error_message: Option<String>,
    /// Blob store URL once bytes are durably stored
    pub blob_url: Option<String>,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document in `uploading` state
    pub fn new(
        knowledge_base_id: Uuid,
        stored_name: impl Into<String>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            knowledge_base_id,
            stored_name: stored_name.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            status: DocumentStatus::Uploading,
            error_message: None,
            blob_url: None,
            content_hash: content_hash.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Position of a chunk within its source document
///
/// Offsets are byte positions in the pre-trim extracted text. Page and
/// section are present only when the source format provides them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkPosition {
    /// Start offset in the extracted text
    pub char_start: usize,
    /// End offset in the extracted text
    pub char_end: usize,
    /// Page number (1-indexed) for paginated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Section or heading title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// A bounded span of a document's text, the atomic unit of embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content (trimmed)
    pub content: String,
    /// Ordinal index within the document (0-based, gapless)
    pub chunk_index: u32,
    /// Estimated token count (chars/4 heuristic, not an exact tokenizer count)
    pub token_count: u32,
    /// Identifier of this chunk's vector in the vector index (unique)
    pub vector_id: String,
    /// Position metadata
    pub position: ChunkPosition,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        document_id: Uuid,
        content: impl Into<String>,
        chunk_index: u32,
        token_count: u32,
        vector_id: impl Into<String>,
        position: ChunkPosition,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            chunk_index,
            token_count,
            vector_id: vector_id.into(),
            position,
        }
    }
}
