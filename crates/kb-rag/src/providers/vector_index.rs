//! Vector index provider trait: upsert, filtered query, filtered delete
//!
//! The adapter owns no business logic beyond shape translation. Queries are
//! scoped by a single equality metadata filter; an implementation must never
//! return a vector whose metadata falls outside the filter's scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Metadata field carrying the owning document ID
pub const FIELD_DOCUMENT_ID: &str = "document_id";
/// Metadata field carrying the owning knowledge base ID
pub const FIELD_KNOWLEDGE_BASE_ID: &str = "knowledge_base_id";

/// Metadata stored alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// Owning document ID
    pub document_id: Uuid,
    /// Owning knowledge base ID
    pub knowledge_base_id: Uuid,
    /// Chunk ordinal within the document
    pub chunk_index: u32,
    /// Chunk text, truncated to the index's metadata cap
    pub content: String,
    /// Original file name of the source document
    pub file_name: String,
    /// Estimated token count of the full chunk
    pub token_count: u32,
    /// Upsert timestamp
    pub created_at: DateTime<Utc>,
}

impl VectorMetadata {
    /// Value of a named filterable field, if it exists
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            FIELD_DOCUMENT_ID => Some(self.document_id.to_string()),
            FIELD_KNOWLEDGE_BASE_ID => Some(self.knowledge_base_id.to_string()),
            _ => None,
        }
    }

    /// Truncate the content field to at most `limit` characters
    ///
    /// Vector index metadata has a size ceiling distinct from the primary
    /// text store; oversized payloads are truncated, never rejected.
    pub fn truncate_content(&mut self, limit: usize) {
        if self.content.chars().count() > limit {
            self.content = self.content.chars().take(limit).collect();
        }
    }
}

/// A vector with its ID and metadata, ready for upsert
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Vector ID, unique within the index
    pub id: String,
    /// Embedding values
    pub vector: Vec<f32>,
    /// Metadata
    pub metadata: VectorMetadata,
}

/// A query match
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// Vector ID
    pub id: String,
    /// Similarity score (higher is more similar)
    pub score: f32,
    /// Metadata stored with the vector
    pub metadata: VectorMetadata,
}

/// Equality constraint on a single named metadata field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorFilter {
    /// Field name
    pub field: String,
    /// Required value
    pub value: String,
}

impl VectorFilter {
    /// Scope to one knowledge base
    pub fn knowledge_base(id: Uuid) -> Self {
        Self {
            field: FIELD_KNOWLEDGE_BASE_ID.to_string(),
            value: id.to_string(),
        }
    }

    /// Scope to one document
    pub fn document(id: Uuid) -> Self {
        Self {
            field: FIELD_DOCUMENT_ID.to_string(),
            value: id.to_string(),
        }
    }

    /// Whether the given metadata matches this filter
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        metadata.field_value(&self.field).as_deref() == Some(self.value.as_str())
    }
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `MemoryVectorIndex`: in-process cosine scan
/// - `PineconeIndex`: Pinecone-compatible REST index
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Upsert vectors, returning the IDs written
    ///
    /// A no-op returning an empty list on empty input. Metadata content is
    /// truncated to the index's cap before writing.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>>;

    /// Query the `top_k` nearest vectors matching the filter
    ///
    /// Results carry `score >= min_score` strictly and are sorted by
    /// descending score.
    async fn query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorMatch>>;

    /// Best-effort deletion of all vectors matching the filter
    ///
    /// Partial failure is logged, never surfaced: the caller's metadata
    /// cleanup proceeds regardless, and vector-store consistency is
    /// reconciled eventually.
    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
