//! Blob store trait for durable byte storage reachable by URL

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Handle to a stored blob
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// URL the bytes can be fetched back from
    pub url: String,
}

/// Trait for durable byte storage
///
/// The contract is put/fetch only: blobs are immutable once written.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a name, returning the blob URL
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<StoredBlob>;

    /// Fetch bytes by URL
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Blob store backed by a local directory, with `file://` URLs
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a blob store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // Stored names are generated by the pipeline; reject anything that
        // would escape the root.
        if name.contains('/') || name.contains("..") {
            return Err(Error::blob_store(format!("invalid blob name: {}", name)));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<StoredBlob> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(StoredBlob {
            url: format!("file://{}", path.display()),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| Error::blob_store(format!("unsupported blob url: {}", url)))?;
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::blob_store(format!("failed to read {}: {}", url, e)))
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}
