//! In-process vector index
//!
//! Brute-force cosine scan over an in-memory map. Reference backend for
//! tests and small deployments; the REST adapter covers everything larger.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;

use super::vector_index::{
    VectorFilter, VectorIndexProvider, VectorMatch, VectorMetadata, VectorRecord,
};

/// Default character cap for the metadata content field
const METADATA_CONTENT_LIMIT: usize = 1000;

/// In-process vector index with cosine similarity
pub struct MemoryVectorIndex {
    entries: RwLock<HashMap<String, (Vec<f32>, VectorMetadata)>>,
    metadata_content_limit: usize,
}

impl MemoryVectorIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metadata_content_limit: METADATA_CONTENT_LIMIT,
        }
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndexProvider for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = self.entries.write();
        let mut ids = Vec::with_capacity(records.len());
        for mut record in records {
            record.metadata.truncate_content(self.metadata_content_limit);
            ids.push(record.id.clone());
            entries.insert(record.id, (record.vector, record.metadata));
        }
        Ok(ids)
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorMatch>> {
        let entries = self.entries.read();

        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, (_, metadata))| filter.matches(metadata))
            .map(|(id, (values, metadata))| VectorMatch {
                id: id.clone(),
                score: Self::cosine_similarity(vector, values),
                metadata: metadata.clone(),
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, metadata)| !filter.matches(metadata));
        tracing::debug!(
            "deleted {} vectors matching {}={}",
            before - entries.len(),
            filter.field,
            filter.value
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(id: &str, vector: Vec<f32>, kb: Uuid, doc: Uuid) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata: VectorMetadata {
                document_id: doc,
                knowledge_base_id: kb,
                chunk_index: 0,
                content: format!("content of {}", id),
                file_name: "test.txt".to_string(),
                token_count: 4,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let index = MemoryVectorIndex::new();
        let ids = index.upsert(Vec::new()).await.unwrap();
        assert!(ids.is_empty());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_query_respects_min_score() {
        let index = MemoryVectorIndex::new();
        let kb = Uuid::new_v4();
        let doc = Uuid::new_v4();

        index
            .upsert(vec![
                record("close", vec![1.0, 0.0], kb, doc),
                record("far", vec![0.0, 1.0], kb, doc),
            ])
            .await
            .unwrap();

        let filter = VectorFilter::knowledge_base(kb);
        let matches = index.query(&[1.0, 0.0], &filter, 10, 0.5).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "close");
    }

    #[tokio::test]
    async fn test_multi_tenant_isolation() {
        let index = MemoryVectorIndex::new();
        let kb_a = Uuid::new_v4();
        let kb_b = Uuid::new_v4();
        let doc = Uuid::new_v4();

        // The vector in B scores higher than anything in A
        index
            .upsert(vec![
                record("a", vec![0.7, 0.7], kb_a, doc),
                record("b", vec![1.0, 0.0], kb_b, doc),
            ])
            .await
            .unwrap();

        let filter = VectorFilter::knowledge_base(kb_a);
        let matches = index.query(&[1.0, 0.0], &filter, 10, 0.0).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].metadata.knowledge_base_id, kb_a);
    }

    #[tokio::test]
    async fn test_results_sorted_descending() {
        let index = MemoryVectorIndex::new();
        let kb = Uuid::new_v4();
        let doc = Uuid::new_v4();

        index
            .upsert(vec![
                record("mid", vec![0.8, 0.2], kb, doc),
                record("best", vec![1.0, 0.0], kb, doc),
                record("worst", vec![0.4, 0.6], kb, doc),
            ])
            .await
            .unwrap();

        let filter = VectorFilter::knowledge_base(kb);
        let matches = index.query(&[1.0, 0.0], &filter, 10, 0.0).await.unwrap();

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "mid", "worst"]);
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let index = MemoryVectorIndex::new();
        let kb = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        index
            .upsert(vec![
                record("a0", vec![1.0, 0.0], kb, doc_a),
                record("a1", vec![0.9, 0.1], kb, doc_a),
                record("b0", vec![0.0, 1.0], kb, doc_b),
            ])
            .await
            .unwrap();

        index
            .delete_by_filter(&VectorFilter::document(doc_a))
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let filter = VectorFilter::knowledge_base(kb);
        let matches = index.query(&[0.0, 1.0], &filter, 10, 0.0).await.unwrap();
        assert_eq!(matches[0].id, "b0");
    }

    #[tokio::test]
    async fn test_metadata_content_truncated() {
        let index = MemoryVectorIndex::new();
        let kb = Uuid::new_v4();
        let doc = Uuid::new_v4();

        let mut rec = record("big", vec![1.0, 0.0], kb, doc);
        rec.metadata.content = "x".repeat(5000);
        index.upsert(vec![rec]).await.unwrap();

        let filter = VectorFilter::knowledge_base(kb);
        let matches = index.query(&[1.0, 0.0], &filter, 1, 0.0).await.unwrap();
        assert_eq!(matches[0].metadata.content.len(), 1000);
    }
}
