//! Job queue for detached document processing
//!
//! The queue decouples the upload request from the pipeline: submission
//! returns immediately and the document's status column is the only
//! externally observable progress signal. An in-flight set refuses double
//! submission of a document that is still being processed.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A unit of background work: one document to run through the pipeline
#[derive(Debug, Clone, Copy)]
pub struct IngestJob {
    /// Document to process
    pub document_id: Uuid,
}

/// Queue feeding the ingest worker
pub struct IngestQueue {
    sender: mpsc::Sender<IngestJob>,
    inflight: DashMap<Uuid, ()>,
    depth: AtomicUsize,
}

impl IngestQueue {
    /// Create a queue with the given capacity, returning the receiver for
    /// the worker
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IngestJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            inflight: DashMap::new(),
            depth: AtomicUsize::new(0),
        };
        (queue, receiver)
    }

    /// Submit a document for processing
    ///
    /// Returns `false` without queueing when the document is already in
    /// flight.
    pub async fn submit(&self, document_id: Uuid) -> Result<bool> {
        if self.inflight.insert(document_id, ()).is_some() {
            tracing::warn!("document {} already queued, ignoring submission", document_id);
            return Ok(false);
        }

        if let Err(e) = self.sender.send(IngestJob { document_id }).await {
            self.inflight.remove(&document_id);
            return Err(Error::internal(format!("job queue closed: {}", e)));
        }

        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    /// Whether a document is queued or being processed
    pub fn is_inflight(&self, document_id: Uuid) -> bool {
        self.inflight.contains_key(&document_id)
    }

    /// Number of jobs accepted and not yet finished
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Mark a job finished; called by the worker
    pub(crate) fn finish(&self, document_id: Uuid) {
        if self.inflight.remove(&document_id).is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
