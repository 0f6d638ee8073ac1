//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpClientTrait;
use crate::domain::embedding::{normalize, EmbeddingProvider};
use crate::domain::CacheError;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding adapter for `/v1/embeddings`-compatible endpoints
///
/// Requests vectors of the configured dimensionality and L2-normalizes
/// whatever comes back, so callers can hand the result straight to the cache.
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>, dimensions: usize) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL, dimensions)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        let api_key = api_key.into();
        let auth_header = format!("Bearer {}", api_key);
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), self.auth_header.clone()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>, CacheError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
            "dimensions": self.dimensions,
        });

        let json = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        let mut response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            CacheError::internal(format!("Failed to parse embedding response: {}", e))
        })?;

        response.data.sort_by_key(|d| d.index);

        response
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimensions {
                    return Err(CacheError::internal(format!(
                        "Embedding provider returned {} dimensions, expected {}",
                        d.embedding.len(),
                        self.dimensions
                    )));
                }
                Ok(normalize(&d.embedding))
            })
            .collect()
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CacheError> {
        self.request(serde_json::json!(text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CacheError::internal("Embedding response contained no data"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CacheError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.request(serde_json::json!(texts)).await?;

        if embeddings.len() != texts.len() {
            return Err(CacheError::internal(format!(
                "Embedding response had {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        tracing::debug!(count = texts.len(), model = %self.model, "Embedded batch");

        Ok(embeddings)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::l2_norm;
    use crate::infrastructure::embedding::{HttpClient, MockHttpClientTrait};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_mock_response(num_embeddings: usize, dimensions: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..num_embeddings)
            .rev()
            .map(|i| {
                let embedding: Vec<f32> =
                    (0..dimensions).map(|j| (i + j + 1) as f32 * 0.5).collect();
                serde_json::json!({
                    "index": i,
                    "embedding": embedding,
                    "object": "embedding"
                })
            })
            .collect();

        serde_json::json!({
            "model": DEFAULT_EMBEDDING_MODEL,
            "data": data,
            "usage": { "prompt_tokens": 10, "total_tokens": 10 }
        })
    }

    #[tokio::test]
    async fn test_embed_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": DEFAULT_EMBEDDING_MODEL,
                "dimensions": 8
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_mock_response(1, 8)))
            .mount(&server)
            .await;

        let provider =
            OpenAiEmbeddingProvider::with_base_url(HttpClient::new(), "test-key", server.uri(), 8);

        let embedding = provider.embed("Hello world").await.unwrap();

        assert_eq!(embedding.len(), 8);
        assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_mock_response(3, 4)))
            .mount(&server)
            .await;

        let provider =
            OpenAiEmbeddingProvider::with_base_url(HttpClient::new(), "k", server.uri(), 4);

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        let expected_first = normalize(&[0.5, 1.0, 1.5, 2.0]);
        assert!((embeddings[0][0] - expected_first[0]).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let mut client = MockHttpClientTrait::new();
        client
            .expect_post_json()
            .returning(|_, _, _| Ok(create_mock_response(1, 3)));

        let provider = OpenAiEmbeddingProvider::new(client, "k", 384);
        let err = provider.embed("text").await.unwrap_err();

        assert!(matches!(err, CacheError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_embed_error_propagates() {
        let mut client = MockHttpClientTrait::new();
        client
            .expect_post_json()
            .withf(|url, _, _| url.starts_with("https://api.openai.com/v1/embeddings"))
            .returning(|_, _, _| Err(CacheError::transient("Rate limit exceeded")));

        let provider = OpenAiEmbeddingProvider::new(client, "k", 8);

        assert!(provider.embed("Hello").await.is_err());
    }

    #[test]
    fn test_provider_info() {
        let provider = OpenAiEmbeddingProvider::new(MockHttpClientTrait::new(), "k", 384)
            .with_model("text-embedding-3-large");

        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.model(), "text-embedding-3-large");
    }
}
