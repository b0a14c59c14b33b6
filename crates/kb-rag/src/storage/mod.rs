//! Metadata storage: knowledge base, document, and chunk records

pub mod database;
pub mod store;

pub use database::SqliteMetadataStore;
pub use store::MetadataStore;
