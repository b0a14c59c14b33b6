//! Document ingestion: text extraction and chunking

pub mod chunker;
pub mod extractor;

pub use chunker::{estimate_tokens, PageText, TextChunker, TextSplit};
pub use extractor::{ExtractedText, TextExtractor};
