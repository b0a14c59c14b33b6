//! Core types for the knowledge-base pipeline

pub mod document;
pub mod knowledge_base;

pub use document::{Chunk, ChunkPosition, Document, DocumentStatus};
pub use knowledge_base::{KnowledgeBase, Visibility};
