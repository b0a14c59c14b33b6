//! Retrieval engine: embed, search, dedupe, budget, attribute

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingGenerator;
use crate::error::Result;
use crate::providers::{VectorFilter, VectorIndexProvider, VectorMatch};
use crate::storage::MetadataStore;

/// A chunk admitted into a retrieval context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Owning document ID
    pub document_id: Uuid,
    /// Full chunk text from the metadata store
    pub content: String,
    /// Chunk ordinal within its document
    pub chunk_index: u32,
    /// Estimated token count
    pub token_count: u32,
    /// Similarity score from the vector index
    pub score: f32,
    /// Original file name of the source document
    pub file_name: String,
    /// Page number for paginated sources
    pub page: Option<u32>,
}

/// Per-file attribution of an assembled context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSummary {
    /// Original file name
    pub file_name: String,
    /// Number of admitted chunks from this file
    pub chunk_count: usize,
}

/// Context assembled for a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Admitted chunks, in descending score order
    pub chunks: Vec<RetrievedChunk>,
    /// Exact sum of admitted chunks' token estimates
    pub total_tokens: u32,
    /// Files represented in the context, by descending chunk count
    pub sources: Vec<SourceSummary>,
}

impl RetrievedContext {
    /// Context with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any chunks were admitted
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Word-set Jaccard similarity of two texts
///
/// Case-insensitive over unicode words. Two texts without any words are
/// treated as identical.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let words_a: HashSet<String> = a.unicode_words().map(|w| w.to_lowercase()).collect();
    let words_b: HashSet<String> = b.unicode_words().map(|w| w.to_lowercase()).collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f32 / union as f32
}

/// Retrieval over one knowledge base's vectors and chunk rows
pub struct RetrievalEngine {
    embedder: EmbeddingGenerator,
    index: Arc<dyn VectorIndexProvider>,
    store: Arc<dyn MetadataStore>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create an engine with the given defaults
    pub fn new(
        embedder: EmbeddingGenerator,
        index: Arc<dyn VectorIndexProvider>,
        store: Arc<dyn MetadataStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            config,
        }
    }

    /// Retrieve a context using the engine's configured defaults
    pub async fn retrieve(&self, query: &str, knowledge_base_id: Uuid) -> Result<RetrievedContext> {
        let config = self.config.clone();
        self.retrieve_with(query, knowledge_base_id, &config).await
    }

    /// Retrieve a context with explicit parameters
    ///
    /// Embedding or index failures propagate to the caller; candidates
    /// without a matching chunk row are dropped silently.
    pub async fn retrieve_with(
        &self,
        query: &str,
        knowledge_base_id: Uuid,
        config: &RetrievalConfig,
    ) -> Result<RetrievedContext> {
        let query_vector = self.embedder.embed(query).await?;

        // Oversample: diversity filtering below removes near-duplicates,
        // so fetch twice the target count.
        let filter = VectorFilter::knowledge_base(knowledge_base_id);
        let mut candidates = self
            .index
            .query(&query_vector, &filter, config.top_k * 2, config.min_score)
            .await?;

        if candidates.is_empty() {
            return Ok(RetrievedContext::empty());
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let kept = Self::diversity_filter(&candidates, config.diversity_threshold);
        let survivors = self.join_chunk_rows(&kept)?;
        let (admitted, total_tokens) = Self::pack_token_budget(survivors, config.max_tokens);
        let sources = Self::summarize_sources(&admitted);

        tracing::debug!(
            "retrieved {} chunks ({} tokens) from {} candidates",
            admitted.len(),
            total_tokens,
            candidates.len()
        );

        Ok(RetrievedContext {
            chunks: admitted,
            total_tokens,
            sources,
        })
    }

    /// Keep a candidate only if its content stays lexically distinct from
    /// every already-kept candidate
    fn diversity_filter(candidates: &[VectorMatch], threshold: f32) -> Vec<VectorMatch> {
        let mut kept: Vec<VectorMatch> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let near_duplicate = kept.iter().any(|existing| {
                jaccard_similarity(&candidate.metadata.content, &existing.metadata.content)
                    >= threshold
            });
            if !near_duplicate {
                kept.push(candidate.clone());
            }
        }

        kept
    }

    /// Join vector matches against chunk rows by vector ID
    ///
    /// A match without a row signals a consistency gap; it is dropped
    /// without failing the query.
    fn join_chunk_rows(&self, matches: &[VectorMatch]) -> Result<Vec<RetrievedChunk>> {
        let vector_ids: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
        let rows = self.store.chunks_by_vector_ids(&vector_ids)?;
        let by_vector_id: HashMap<&str, &crate::types::Chunk> =
            rows.iter().map(|c| (c.vector_id.as_str(), c)).collect();

        let mut survivors = Vec::with_capacity(matches.len());
        for m in matches {
            match by_vector_id.get(m.id.as_str()) {
                Some(chunk) => survivors.push(RetrievedChunk {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    content: chunk.content.clone(),
                    chunk_index: chunk.chunk_index,
                    token_count: chunk.token_count,
                    score: m.score,
                    file_name: m.metadata.file_name.clone(),
                    page: chunk.position.page,
                }),
                None => {
                    tracing::debug!("no chunk row for vector {}, dropping candidate", m.id);
                }
            }
        }
        Ok(survivors)
    }

    /// Admit chunks by descending score while the running token sum stays
    /// within budget
    ///
    /// First-fit-by-score: a chunk that would overflow is skipped, not
    /// replaced by a smaller one.
    fn pack_token_budget(
        mut survivors: Vec<RetrievedChunk>,
        max_tokens: u32,
    ) -> (Vec<RetrievedChunk>, u32) {
        survivors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut admitted = Vec::with_capacity(survivors.len());
        let mut total = 0u32;
        for chunk in survivors {
            if total + chunk.token_count <= max_tokens {
                total += chunk.token_count;
                admitted.push(chunk);
            }
        }
        (admitted, total)
    }

    /// Group admitted chunks by file name, descending by chunk count
    fn summarize_sources(admitted: &[RetrievedChunk]) -> Vec<SourceSummary> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for chunk in admitted {
            *counts.entry(chunk.file_name.as_str()).or_default() += 1;
        }

        let mut sources: Vec<SourceSummary> = counts
            .into_iter()
            .map(|(file_name, chunk_count)| SourceSummary {
                file_name: file_name.to_string(),
                chunk_count,
            })
            .collect();
        sources.sort_by(|a, b| {
            b.chunk_count
                .cmp(&a.chunk_count)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        sources
    }
}
