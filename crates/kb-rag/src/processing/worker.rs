//! Background worker consuming the ingest queue

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::config::ProcessingConfig;
use crate::processing::ingestor::Ingestor;
use crate::processing::queue::{IngestJob, IngestQueue};

/// Worker pool processing documents from the queue
///
/// Documents process independently; a semaphore bounds how many run at
/// once. There is no cancellation: once a document's pipeline starts it
/// runs to `ready` or `failed`.
pub struct IngestWorker {
    ingestor: Arc<Ingestor>,
    queue: Arc<IngestQueue>,
    parallel_documents: usize,
}

impl IngestWorker {
    /// Create a worker
    pub fn new(ingestor: Arc<Ingestor>, queue: Arc<IngestQueue>, config: &ProcessingConfig) -> Self {
        Self {
            ingestor,
            queue,
            parallel_documents: config.parallel_documents(),
        }
    }

    /// Create the queue, spawn the worker onto the runtime, and return the
    /// queue handle
    pub fn start(ingestor: Arc<Ingestor>, config: &ProcessingConfig) -> Arc<IngestQueue> {
        let (queue, receiver) = IngestQueue::new(config.queue_capacity);
        let queue = Arc::new(queue);
        let worker = Self::new(ingestor, Arc::clone(&queue), config);
        tokio::spawn(worker.run(receiver));
        queue
    }

    /// Consume jobs until the queue closes
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        tracing::info!(
            "ingest worker started: {} parallel documents",
            self.parallel_documents
        );

        let semaphore = Arc::new(Semaphore::new(self.parallel_documents));

        while let Some(job) = receiver.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let ingestor = Arc::clone(&self.ingestor);
            let queue = Arc::clone(&self.queue);

            tokio::spawn(async move {
                let _permit = permit;
                let document_id = job.document_id;

                match ingestor.process_document(document_id).await {
                    Ok(status) => {
                        tracing::info!("document {} finished as {}", document_id, status)
                    }
                    Err(e) => {
                        tracing::error!("document {} could not be processed: {}", document_id, e)
                    }
                }

                queue.finish(document_id);
            });
        }

        tracing::info!("ingest worker stopped");
    }
}
