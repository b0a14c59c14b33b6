//! Background document processing

pub mod ingestor;
pub mod queue;
pub mod worker;

pub use ingestor::Ingestor;
pub use queue::{IngestJob, IngestQueue};
pub use worker::IngestWorker;
