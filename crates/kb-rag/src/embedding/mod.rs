//! Embedding generation with input validation and ordered batching

use futures::future::try_join_all;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Wraps an embedding provider and enforces the embedding contract
///
/// Single-text calls reject blank and over-long input and verify the
/// returned dimension. Batch calls partition the input into fixed-size
/// windows issued concurrently; results are reassembled strictly in input
/// order, so concurrency is a throughput choice, never a correctness one.
/// Any single failure aborts the whole batch.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingGenerator {
    /// Create a generator around a provider
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Embedding dimensions of the underlying provider
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.validate_input(text)?;

        let vector = self.provider.embed(text).await?;
        self.validate_vector(&vector)?;
        Ok(vector)
    }

    /// Embed many texts, preserving input order
    ///
    /// There is no partial-batch success: callers needing partial tolerance
    /// retry at the document level.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            self.validate_input(text)?;
        }

        let windows = texts.chunks(self.batch_size).map(|window| {
            let provider = Arc::clone(&self.provider);
            async move { provider.embed_batch(window).await }
        });

        let results = try_join_all(windows).await?;

        let mut vectors = Vec::with_capacity(texts.len());
        for (window_index, window) in results.into_iter().enumerate() {
            let expected = texts[window_index * self.batch_size..]
                .len()
                .min(self.batch_size);
            if window.len() != expected {
                return Err(Error::MalformedResponse(format!(
                    "batch window returned {} vectors, expected {}",
                    window.len(),
                    expected
                )));
            }
            for vector in window {
                self.validate_vector(&vector)?;
                vectors.push(vector);
            }
        }
        Ok(vectors)
    }

    fn validate_input(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        let len = text.chars().count();
        let max = self.provider.max_input_chars();
        if len > max {
            return Err(Error::InputTooLong { len, max });
        }
        Ok(())
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(Error::MalformedResponse(format!(
                "vector has {} dimensions, expected {}",
                vector.len(),
                expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic test provider: the first component encodes the text's
    /// first byte, so order is checkable.
    struct StubProvider {
        dimensions: usize,
        max_input_chars: usize,
        fail_on: Option<String>,
        wrong_dims_on: Option<String>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                max_input_chars: 100,
                fail_on: None,
                wrong_dims_on: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(text) {
                return Err(Error::embedding("stub failure"));
            }
            let dims = if self.wrong_dims_on.as_deref() == Some(text) {
                self.dimensions + 1
            } else {
                self.dimensions
            };
            let mut v = vec![0.0; dims];
            v[0] = text.as_bytes()[0] as f32;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn max_input_chars(&self) -> usize {
            self.max_input_chars
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn generator(provider: StubProvider, batch_size: usize) -> EmbeddingGenerator {
        let config = EmbeddingConfig {
            batch_size,
            ..Default::default()
        };
        EmbeddingGenerator::new(Arc::new(provider), &config)
    }

    #[tokio::test]
    async fn test_embed_rejects_empty() {
        let gen = generator(StubProvider::new(4), 10);
        assert!(matches!(gen.embed("   ").await.unwrap_err(), Error::EmptyInput));
    }

    #[tokio::test]
    async fn test_embed_rejects_too_long() {
        let gen = generator(StubProvider::new(4), 10);
        let long = "x".repeat(101);
        assert!(matches!(
            gen.embed(&long).await.unwrap_err(),
            Error::InputTooLong { .. }
        ));
    }

    #[tokio::test]
    async fn test_embed_checks_dimension() {
        let provider = StubProvider {
            wrong_dims_on: Some("bad".to_string()),
            ..StubProvider::new(4)
        };
        let gen = generator(provider, 10);
        assert!(matches!(
            gen.embed("bad").await.unwrap_err(),
            Error::MalformedResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_across_windows() {
        let gen = generator(StubProvider::new(4), 3);
        let texts: Vec<String> = (b'a'..=b'j').map(|c| (c as char).to_string()).collect();

        let vectors = gen.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 10);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector[0], text.as_bytes()[0] as f32);
        }
    }

    #[tokio::test]
    async fn test_batch_empty_input_is_noop() {
        let gen = generator(StubProvider::new(4), 3);
        let vectors = gen.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_batch_fails_fast_on_single_item() {
        let provider = StubProvider {
            fail_on: Some("f".to_string()),
            ..StubProvider::new(4)
        };
        let gen = generator(provider, 2);
        let texts: Vec<String> = ["a", "b", "f", "d"].iter().map(|s| s.to_string()).collect();

        assert!(gen.embed_batch(&texts).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_validates_every_input_upfront() {
        let gen = generator(StubProvider::new(4), 2);
        let texts: Vec<String> = ["a", "  ", "c"].iter().map(|s| s.to_string()).collect();

        assert!(matches!(
            gen.embed_batch(&texts).await.unwrap_err(),
            Error::EmptyInput
        ));
    }
}
