//! Embedding providers for the vector matcher
//!
//! Provides text embeddings through a single `EmbeddingProvider` strategy:
//! - `HttpEmbeddingProvider`: OpenAI-compatible network backend
//! - `HashedTermEmbedder`: deterministic local backend, always available
//!
//! The backend is chosen once, from configuration, when the pipeline is
//! built. When the chosen backend fails at run time the matcher switches
//! to keyword overlap scoring; providers never fall back silently.

pub mod cache;
pub mod hashed;
pub mod http;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub use cache::EmbeddingCache;
pub use hashed::HashedTermEmbedder;
pub use http::HttpEmbeddingProvider;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::EmbeddingError;
use crate::types::content_address;

/// Largest number of texts sent to a provider in one call
pub const EMBED_BATCH_SIZE: usize = 64;

/// Embedding generation backend
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Dimensionality of produced vectors
    fn dimensions(&self) -> usize;

    /// Namespace of this provider's entries in a shared `EmbeddingCache`.
    ///
    /// Must differ between providers whose vectors differ, so it includes
    /// the dimensions and, for remote backends, the model.
    fn cache_namespace(&self) -> String {
        format!("{}/{}", self.name(), self.dimensions())
    }

    /// Embed a batch of texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::BatchSizeMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

/// Build the provider selected by configuration.
///
/// Returns `None` for `EmbeddingBackend::Disabled`.
pub fn build_provider(config: &EmbeddingConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::Local => {
            info!(dims = config.dimensions, "using local hashed-term embeddings");
            Some(Arc::new(HashedTermEmbedder::new(config.dimensions)))
        }
        EmbeddingBackend::Http => {
            let api_key = std::env::var(&config.api_key_env).ok();
            if api_key.is_none() {
                warn!(
                    env = %config.api_key_env,
                    "embedding API key not set, requests will be unauthenticated"
                );
            }
            info!(base_url = %config.base_url, model = %config.model, "using HTTP embeddings");
            Some(Arc::new(HttpEmbeddingProvider::new(
                &config.base_url,
                &config.model,
                api_key,
                config.dimensions,
            )))
        }
        EmbeddingBackend::Disabled => {
            info!("embeddings disabled, keyword overlap scoring only");
            None
        }
    }
}

/// Embed `texts`, serving what it can from `cache` and writing new vectors
/// back to it.
pub async fn embed_cached(
    provider: &dyn EmbeddingProvider,
    cache: &EmbeddingCache,
    texts: &[String],
) -> Result<Vec<Arc<Vec<f32>>>, EmbeddingError> {
    let namespace = provider.cache_namespace();
    let dimensions = provider.dimensions();
    let keys: Vec<String> = texts
        .iter()
        .map(|t| content_address(&namespace, t))
        .collect();

    let mut out: Vec<Option<Arc<Vec<f32>>>> = keys
        .iter()
        .map(|k| match cache.get(k) {
            Some(v) if v.len() != dimensions => {
                warn!(
                    namespace = %namespace,
                    expected = dimensions,
                    actual = v.len(),
                    "discarding cached embedding with wrong dimensions"
                );
                cache.evict(k);
                None
            }
            hit => hit,
        })
        .collect();
    let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();

    for indices in missing.chunks(EMBED_BATCH_SIZE) {
        let batch: Vec<String> = indices.iter().map(|&i| texts[i].clone()).collect();
        let vectors = provider.embed_batch(&batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        for (&i, vector) in indices.iter().zip(vectors) {
            if vector.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
            out[i] = Some(cache.insert(keys[i].clone(), vector));
        }
    }

    Ok(out.into_iter().flatten().collect())
}

/// Compute cosine similarity between two embeddings, clamped to [0, 1]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        inputs: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn cache_serves_repeated_texts() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            inputs: AtomicUsize::new(0),
        };
        let cache = EmbeddingCache::new();
        let texts = vec!["alpha".to_string(), "be".to_string()];

        let first = embed_cached(&provider, &cache, &texts).await.unwrap();
        let second = embed_cached(&provider, &cache, &texts).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.inputs.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn shared_cache_keeps_dimensions_apart() {
        let cache = EmbeddingCache::new();
        let texts = vec!["institutional effectiveness assessment".to_string()];

        let wide = embed_cached(&HashedTermEmbedder::new(384), &cache, &texts).await.unwrap();
        let narrow = embed_cached(&HashedTermEmbedder::new(128), &cache, &texts).await.unwrap();

        assert_eq!(wide[0].len(), 384);
        assert_eq!(narrow[0].len(), 128);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn wrong_length_cache_entry_is_replaced() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            inputs: AtomicUsize::new(0),
        };
        let cache = EmbeddingCache::new();
        let key = content_address(&provider.cache_namespace(), "alpha");
        cache.insert(key.clone(), vec![1.0, 2.0, 3.0]);

        let vectors = embed_cached(&provider, &cache, &["alpha".to_string()]).await.unwrap();

        assert_eq!(*vectors[0], vec![5.0, 1.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key).map(|v| v.len()), Some(2));
    }

    #[test]
    fn cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn disabled_backend_builds_no_provider() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Disabled,
            ..Default::default()
        };
        assert!(build_provider(&config).is_none());

        let local = build_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(local.name(), "hashed-term");
        assert_eq!(local.cache_namespace(), "hashed-term/384");
    }
}
