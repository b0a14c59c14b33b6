//! Error types for the knowledge-base pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported document format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Extraction produced only whitespace
    #[error("Document contains no extractable text")]
    EmptyContent,

    /// Blank input where text was required
    #[error("Input text is empty")]
    EmptyInput,

    /// Input exceeds the embedding provider's character ceiling
    #[error("Input too long: {len} characters exceeds limit of {max}")]
    InputTooLong { len: usize, max: usize },

    /// Embedding provider violated its contract
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    /// Document or chunk missing mid-pipeline
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal document status transition
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Embedding provider call failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index upsert/query failure
    #[error("Vector index error: {0}")]
    VectorStore(String),

    /// Metadata store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Blob store failure
    #[error("Blob store error: {0}")]
    BlobStore(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a blob store error
    pub fn blob_store(message: impl Into<String>) -> Self {
        Self::BlobStore(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
