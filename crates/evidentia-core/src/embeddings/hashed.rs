//! Local hashed-term embedder.
//!
//! Term-frequency vectors folded into a fixed number of buckets with
//! FNV-1a, weighted by a length-based IDF approximation and L2 normalized.
//! Fully deterministic and offline; not as semantically rich as a neural
//! model, but identical text always yields identical vectors.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use crate::text;

#[derive(Debug, Clone)]
pub struct HashedTermEmbedder {
    dimensions: usize,
}

impl HashedTermEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }

    /// Embed synchronously
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = text::tokenize(text);
        let mut vec = vec![0.0f32; self.dimensions];
        if tokens.is_empty() {
            return vec;
        }

        // BTreeMap keeps accumulation order stable across runs.
        let mut tf: BTreeMap<&str, f32> = BTreeMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in tf {
            let idf = 1.0 + (term.chars().count() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += (count / total) * idf;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashedTermEmbedder {
    fn name(&self) -> &str {
        "hashed-term"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn empty_text_returns_zero_vector() {
        let embedder = HashedTermEmbedder::new(128);
        let v = embedder.vector("");
        assert_eq!(v.len(), 128);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn deterministic_and_normalized() {
        let embedder = HashedTermEmbedder::new(384);
        let a = embedder.vector("institutional effectiveness assessment");
        let b = embedder.vector("institutional effectiveness assessment");
        assert_eq!(a, b);

        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    fn same_terms_score_higher_than_unrelated_text() {
        let embedder = HashedTermEmbedder::new(384);
        let standard = embedder.vector("Institutional Effectiveness assessment");
        let related = embedder.vector("institutional effectiveness assessment");
        let unrelated = embedder.vector("campus parking permits and shuttle schedules");

        assert!(cosine_similarity(&standard, &related) > 0.99);
        assert!(cosine_similarity(&standard, &unrelated) < 0.5);
    }
}
