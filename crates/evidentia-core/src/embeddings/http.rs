//! OpenAI-compatible embeddings backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingProvider;
use crate::error::EmbeddingError;

#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            http_client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    fn unavailable(&self, reason: impl Into<String>) -> EmbeddingError {
        EmbeddingError::Unavailable {
            provider: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http-embeddings"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn cache_namespace(&self) -> String {
        format!("{}/{}/{}", self.name(), self.model, self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("HTTP {}: {}", status, body)));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("invalid response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = HttpEmbeddingProvider::new("http://localhost:8080/v1/", "m", None, 8);
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn cache_namespace_names_model_and_dimensions() {
        let small = HttpEmbeddingProvider::new("http://localhost:8080/v1", "text-embedding-3-small", None, 1536);
        let large = HttpEmbeddingProvider::new("http://localhost:8080/v1", "text-embedding-3-large", None, 3072);
        assert_eq!(small.cache_namespace(), "http-embeddings/text-embedding-3-small/1536");
        assert_ne!(small.cache_namespace(), large.cache_namespace());
    }

    #[tokio::test]
    async fn unreachable_backend_reports_unavailable() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let provider = HttpEmbeddingProvider::new("http://127.0.0.1:9", "m", None, 8);
        let err = provider.embed_batch(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        let provider = HttpEmbeddingProvider::new("http://127.0.0.1:9", "m", None, 8);
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
