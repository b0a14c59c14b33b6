//! Pinecone-compatible vector index adapter
//!
//! Talks to the index's data-plane REST endpoints. Serverless indexes have
//! no native filtered deletion, so `delete_by_filter` resolves matching IDs
//! with a zero-vector query at maximal top-k and deletes by ID.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::PineconeConfig;
use crate::error::{Error, Result};

use super::vector_index::{
    VectorFilter, VectorIndexProvider, VectorMatch, VectorMetadata, VectorRecord,
};

/// Maximum vectors per upsert request
const UPSERT_BATCH: usize = 100;
/// Maximum IDs per delete request
const DELETE_BATCH: usize = 1000;
/// Top-k used to approximate "all matching" during filtered deletion
const DELETE_SCAN_TOP_K: usize = 10_000;

/// Pinecone-compatible REST vector index
pub struct PineconeIndex {
    client: Client,
    index_host: String,
    api_key: String,
    namespace: String,
    dimensions: usize,
    metadata_content_limit: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest {
    vectors: Vec<UpsertVector>,
    namespace: String,
}

#[derive(Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    filter: serde_json::Value,
    include_metadata: bool,
    namespace: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct DeleteRequest {
    ids: Vec<String>,
    namespace: String,
}

impl PineconeIndex {
    /// Create a new adapter from configuration
    ///
    /// `dimensions` must match the index's configured dimension; it sizes
    /// the zero vector used by the filtered-deletion scan.
    pub fn new(config: &PineconeConfig, dimensions: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            index_host: config.index_host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            namespace: config.namespace.clone(),
            dimensions,
            metadata_content_limit: config.metadata_content_limit,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.index_host, path)
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::vector_store(format!("{} request failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_store(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::vector_store(format!("{} response parse failed: {}", path, e)))
    }

    fn filter_json(filter: &VectorFilter) -> serde_json::Value {
        let mut eq = serde_json::Map::new();
        eq.insert(
            "$eq".to_string(),
            serde_json::Value::String(filter.value.clone()),
        );
        let mut object = serde_json::Map::new();
        object.insert(filter.field.clone(), serde_json::Value::Object(eq));
        serde_json::Value::Object(object)
    }

    /// Raw query without score filtering, shared by `query` and the
    /// filtered-deletion scan
    async fn query_raw(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            filter: Self::filter_json(filter),
            include_metadata: true,
            namespace: self.namespace.clone(),
        };

        let response: QueryResponse = self.post_json("query", &request).await?;
        Ok(response.matches)
    }

    async fn delete_ids(&self, ids: Vec<String>) -> Result<()> {
        for batch in ids.chunks(DELETE_BATCH) {
            let request = DeleteRequest {
                ids: batch.to_vec(),
                namespace: self.namespace.clone(),
            };
            let _: serde_json::Value = self.post_json("vectors/delete", &request).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndexProvider for PineconeIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut vectors = Vec::with_capacity(records.len());
        for mut record in records {
            record.metadata.truncate_content(self.metadata_content_limit);
            ids.push(record.id.clone());
            vectors.push(UpsertVector {
                id: record.id,
                values: record.vector,
                metadata: serde_json::to_value(&record.metadata)?,
            });
        }

        let mut total = 0;
        let mut remaining = vectors;
        while !remaining.is_empty() {
            let tail = remaining.split_off(remaining.len().min(UPSERT_BATCH));
            let request = UpsertRequest {
                vectors: remaining,
                namespace: self.namespace.clone(),
            };
            let response: UpsertResponse = self.post_json("vectors/upsert", &request).await?;
            total += response.upserted_count;
            remaining = tail;
        }

        tracing::debug!("upserted {} vectors ({} reported)", ids.len(), total);
        Ok(ids)
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &VectorFilter,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorMatch>> {
        let raw = self.query_raw(vector, filter, top_k).await?;

        let mut matches = Vec::with_capacity(raw.len());
        for m in raw {
            if m.score < min_score {
                continue;
            }
            let metadata: VectorMetadata = match m.metadata {
                Some(value) => match serde_json::from_value(value) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!("skipping match {} with unreadable metadata: {}", m.id, e);
                        continue;
                    }
                },
                None => {
                    tracing::warn!("skipping match {} without metadata", m.id);
                    continue;
                }
            };
            // The server applied the filter; verify anyway so a misbehaving
            // index can never leak another tenant's vectors.
            if !filter.matches(&metadata) {
                tracing::warn!("dropping match {} outside filter scope", m.id);
                continue;
            }
            matches.push(VectorMatch {
                id: m.id,
                score: m.score,
                metadata,
            });
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()> {
        // Resolve matching IDs with a zero vector at maximal top-k, then
        // delete by ID. Errors are logged, not surfaced: metadata cleanup
        // must never block on the vector store.
        let scan = self
            .query_raw(&vec![0.0; self.dimensions], filter, DELETE_SCAN_TOP_K)
            .await;

        match scan {
            Ok(matches) if matches.is_empty() => {}
            Ok(matches) => {
                let ids: Vec<String> = matches.into_iter().map(|m| m.id).collect();
                let count = ids.len();
                if let Err(e) = self.delete_ids(ids).await {
                    tracing::error!(
                        "failed to delete {} vectors matching {}={}: {}",
                        count,
                        filter.field,
                        filter.value,
                        e
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    "failed to resolve vectors matching {}={} for deletion: {}",
                    filter.field,
                    filter.value,
                    e
                );
            }
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let stats: std::result::Result<HashMap<String, serde_json::Value>, _> = self
            .post_json("describe_index_stats", &serde_json::json!({}))
            .await;
        Ok(stats.is_ok())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
