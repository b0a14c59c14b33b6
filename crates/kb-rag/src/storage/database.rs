//! SQLite metadata store
//!
//! Durable storage for knowledge bases, documents, and chunks behind a
//! single connection. Chunk batches insert inside a transaction; the
//! schema's unique constraints back the ordinal and vector-id invariants.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkPosition, Document, DocumentStatus, KnowledgeBase, Visibility};

use super::store::MetadataStore;

/// SQLite-backed metadata store
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("failed to open database: {}", e)))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (tests, throwaway pipelines)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("failed to open in-memory database: {}", e)))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        "#,
        )
        .map_err(|e| Error::database(format!("failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_bases (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                visibility TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                knowledge_base_id TEXT NOT NULL,
                stored_name TEXT NOT NULL,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                blob_url TEXT,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_kb ON documents(knowledge_base_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                vector_id TEXT NOT NULL UNIQUE,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                page INTEGER,
                section TEXT,
                UNIQUE(document_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
        "#,
        )
        .map_err(|e| Error::database(format!("migration failed: {}", e)))?;

        Ok(())
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let knowledge_base_id: String = row.get(1)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(10)?;

    Ok(Document {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::new_v4()),
        knowledge_base_id: Uuid::parse_str(&knowledge_base_id).unwrap_or_else(|_| Uuid::new_v4()),
        stored_name: row.get(2)?,
        original_name: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        status: DocumentStatus::from_str_or_default(&status),
        error_message: row.get(7)?,
        blob_url: row.get(8)?,
        content_hash: row.get(9)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let id: String = row.get(0)?;
    let document_id: String = row.get(1)?;

    Ok(Chunk {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::new_v4()),
        document_id: Uuid::parse_str(&document_id).unwrap_or_else(|_| Uuid::new_v4()),
        content: row.get(2)?,
        chunk_index: row.get::<_, i64>(3)? as u32,
        token_count: row.get::<_, i64>(4)? as u32,
        vector_id: row.get(5)?,
        position: ChunkPosition {
            char_start: row.get::<_, i64>(6)? as usize,
            char_end: row.get::<_, i64>(7)? as usize,
            page: row.get::<_, Option<i64>>(8)?.map(|p| p as u32),
            section: row.get(9)?,
        },
    })
}

const DOCUMENT_COLUMNS: &str = "id, knowledge_base_id, stored_name, original_name, mime_type, \
                                size_bytes, status, error_message, blob_url, content_hash, created_at";
const CHUNK_COLUMNS: &str =
    "id, document_id, content, chunk_index, token_count, vector_id, char_start, char_end, page, section";

impl MetadataStore for SqliteMetadataStore {
    fn create_knowledge_base(&self, kb: &KnowledgeBase) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO knowledge_bases (id, owner_id, name, visibility, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                kb.id.to_string(),
                kb.owner_id.to_string(),
                kb.name,
                kb.visibility.as_str(),
                kb.created_at.to_rfc3339(),
                kb.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn get_knowledge_base(&self, id: Uuid) -> Result<Option<KnowledgeBase>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, owner_id, name, visibility, created_at, updated_at
             FROM knowledge_bases WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let id: String = row.get(0)?;
                let owner_id: String = row.get(1)?;
                let visibility: String = row.get(3)?;
                let created_at: String = row.get(4)?;
                let updated_at: String = row.get(5)?;
                Ok(KnowledgeBase {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::new_v4()),
                    owner_id: Uuid::parse_str(&owner_id).unwrap_or_else(|_| Uuid::new_v4()),
                    name: row.get(2)?,
                    visibility: Visibility::from_str_or_default(&visibility),
                    created_at: parse_timestamp(&created_at),
                    updated_at: parse_timestamp(&updated_at),
                })
            },
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))
    }

    fn delete_knowledge_base(&self, id: Uuid) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id IN
             (SELECT id FROM documents WHERE knowledge_base_id = ?1)",
            params![id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        let documents = tx
            .execute(
                "DELETE FROM documents WHERE knowledge_base_id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute(
            "DELETE FROM knowledge_bases WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(documents)
    }

    fn create_document(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                DOCUMENT_COLUMNS
            ),
            params![
                document.id.to_string(),
                document.knowledge_base_id.to_string(),
                document.stored_name,
                document.original_name,
                document.mime_type,
                document.size_bytes as i64,
                document.status.as_str(),
                document.error_message,
                document.blob_url,
                document.content_hash,
                document.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))
    }

    fn list_documents(&self, knowledge_base_id: Uuid) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents WHERE knowledge_base_id = ?1 ORDER BY created_at",
                DOCUMENT_COLUMNS
            ))
            .map_err(|e| Error::database(e.to_string()))?;

        let rows = stmt
            .query_map(params![knowledge_base_id.to_string()], row_to_document)
            .map_err(|e| Error::database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(e.to_string()))
    }

    fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE documents SET status = ?2, error_message = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), error_message],
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::not_found(format!("document {}", id)));
        }
        Ok(())
    }

    fn update_document_blob(&self, id: Uuid, blob_url: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE documents SET blob_url = ?2 WHERE id = ?1",
                params![id.to_string(), blob_url],
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::not_found(format!("document {}", id)));
        }
        Ok(())
    }

    fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO chunks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    CHUNK_COLUMNS
                ))
                .map_err(|e| Error::database(e.to_string()))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.content,
                    chunk.chunk_index as i64,
                    chunk.token_count as i64,
                    chunk.vector_id,
                    chunk.position.char_start as i64,
                    chunk.position.char_end as i64,
                    chunk.position.page.map(|p| p as i64),
                    chunk.position.section,
                ])
                .map_err(|e| Error::database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn chunks_by_vector_ids(&self, vector_ids: &[String]) -> Result<Vec<Chunk>> {
        if vector_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let placeholders = vec!["?"; vector_ids.len()].join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks WHERE vector_id IN ({})",
                CHUNK_COLUMNS, placeholders
            ))
            .map_err(|e| Error::database(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(vector_ids.iter()), row_to_chunk)
            .map_err(|e| Error::database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(e.to_string()))
    }

    fn chunks_by_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
                CHUNK_COLUMNS
            ))
            .map_err(|e| Error::database(e.to_string()))?;

        let rows = stmt
            .query_map(params![document_id.to_string()], row_to_chunk)
            .map_err(|e| Error::database(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(e.to_string()))
    }

    fn delete_chunks_by_document(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))
    }

    fn delete_document(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])
            .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }
}
