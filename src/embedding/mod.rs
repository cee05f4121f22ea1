//! Embedding provider abstraction and implementations.
//!
//! This module defines the interface for text embedding generation, the
//! cosine similarity used to compare embeddings, and [`LazyEmbedding`], the
//! process-wide wrapper that initializes a provider on first use.
//!
//! The keyword extractor only depends on [`EmbeddingProvider`], so the model
//! can be swapped without touching the extraction logic.

pub mod fastembed;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network or model invocation error
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Invalid input text (e.g., empty, too long)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration or model initialization error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other unexpected errors
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementations must be deterministic: identical input text and model
/// version always produce the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the embedding generation fails
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts in a single batch.
    ///
    /// # Returns
    /// A vector of embedding vectors, in the same order as the input texts
    ///
    /// # Errors
    /// Returns `EmbeddingError` if any embedding generation fails
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for std::sync::Arc<P> {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns `dot(a, b) / (|a| * |b|)`, clamped to `[-1, 1]` to absorb float
/// rounding. The similarity is `0.0` when either vector has zero magnitude
/// or when the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denominator = norm_a * norm_b;
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    (dot_product / denominator).clamp(-1.0, 1.0)
}

type ProviderInit<P> = Box<dyn Fn() -> EmbeddingResult<P> + Send + Sync>;

/// An embedding provider that is built on first use and then reused.
///
/// Concurrent first callers wait on the same initialization instead of
/// starting their own. If initialization fails the error is returned to the
/// waiting callers and the next call tries again.
pub struct LazyEmbedding<P> {
    cell: OnceCell<P>,
    init: ProviderInit<P>,
    label: String,
}

impl<P: EmbeddingProvider> LazyEmbedding<P> {
    /// Wrap a provider constructor.
    ///
    /// # Arguments
    /// * `label` - Name reported by `model_name` before the model is loaded
    /// * `init` - Constructor run at most once successfully
    pub fn new<F>(label: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> EmbeddingResult<P> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
            label: label.into(),
        }
    }

    /// Wrap an already constructed provider.
    pub fn ready(provider: P) -> Self {
        let label = provider.model_name().to_string();
        Self {
            cell: OnceCell::new_with(Some(provider)),
            init: Box::new(|| {
                Err(EmbeddingError::ConfigError(
                    "provider was supplied pre-initialized".to_string(),
                ))
            }),
            label,
        }
    }

    /// Return the provider, initializing it if this is the first use.
    pub async fn get(&self) -> EmbeddingResult<&P> {
        self.cell
            .get_or_try_init(|| async {
                info!(model = %self.label, "Initializing embedding model");
                (self.init)()
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for LazyEmbedding<P> {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.get().await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.get().await?.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.cell.get().map(|p| p.dimension()).unwrap_or(0)
    }

    fn model_name(&self) -> &str {
        self.cell
            .get()
            .map(|p| p.model_name())
            .unwrap_or(&self.label)
    }
}

impl<P> std::fmt::Debug for LazyEmbedding<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEmbedding")
            .field("label", &self.label)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ConstantProvider;

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        async fn embed(&self, _text: &str) -> EmbeddingResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let zero = vec![0.0, 0.0, 0.0];
        let other = vec![0.3, -0.2, 0.9];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&other, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let vectors = [
            vec![0.1, 0.2, 0.3],
            vec![-5.0, 3.0, 1e-3],
            vec![1e6, 1e6, 1e6],
            vec![1e-8, 0.0, -1e-8],
        ];
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b);
                assert!((-1.0..=1.0).contains(&sim), "similarity {} out of range", sim);
            }
        }
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_lazy_embedding_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = Arc::new(LazyEmbedding::new("constant", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ConstantProvider)
        }));

        assert!(!lazy.is_initialized());
        assert_eq!(lazy.model_name(), "constant");
        assert_eq!(lazy.dimension(), 0);

        let mut handles = Vec::new();
        for i in 0..8 {
            let lazy = Arc::clone(&lazy);
            handles.push(tokio::spawn(async move {
                lazy.embed(&format!("text {}", i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
        assert_eq!(lazy.dimension(), 2);
    }

    #[tokio::test]
    async fn test_lazy_embedding_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = LazyEmbedding::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EmbeddingError::ConfigError("model files missing".to_string()))
            } else {
                Ok(ConstantProvider)
            }
        });

        assert!(matches!(
            lazy.embed("text").await,
            Err(EmbeddingError::ConfigError(_))
        ));
        assert!(lazy.embed("text").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lazy_embedding_ready() {
        let lazy = LazyEmbedding::ready(ConstantProvider);
        assert!(lazy.is_initialized());
        let batch = lazy.embed_batch(&["a", "b"]).await.unwrap();
        assert_eq!(batch.len(), 2);
    }
}
