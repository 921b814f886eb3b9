//! Text encoders.
//!
//! An [`Encoder`] maps text to a fixed-length vector. The retrieval core only
//! depends on the trait; two implementations are provided here: an
//! OpenAI-compatible HTTP encoder and a deterministic local hashing encoder.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Trait for text encoders.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Get the name of this encoder.
    fn name(&self) -> &str;

    /// Get the model this encoder uses.
    fn model(&self) -> &str;

    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;

    /// Encode a single text.
    async fn encode(&self, text: &str) -> Result<Embedding>;

    /// Encode multiple texts, preserving order.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.encode(text).await?);
        }
        Ok(results)
    }

    /// Check if the encoder can be used (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// Encoder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEncoder {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model name.
    model: String,

    /// Expected vector length.
    dimension: usize,
}

impl OpenAIEncoder {
    /// Create a new encoder with the default model and no API key.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
            dimension: crate::DEFAULT_DIMENSION,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model and the vector length it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn request(&self, input: serde_json::Value) -> Result<EmbeddingsResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let body = serde_json::json!({
            "input": input,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        Ok(response.json().await?)
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

impl Default for OpenAIEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Encoder for OpenAIEncoder {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        debug!("Encoding query with model: {}", self.model);

        let result = self.request(serde_json::json!(text)).await?;
        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))?
            .embedding;

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Encoding batch of {} texts with model: {}",
            texts.len(),
            self.model
        );

        let mut data = self.request(serde_json::json!(texts)).await?.data;
        if data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        // The API reports positions explicitly; don't trust response order.
        data.sort_by_key(|item| item.index);

        let embeddings: Vec<Embedding> = data.into_iter().map(|item| item.embedding).collect();
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        info!("Encoded {} texts", embeddings.len());
        Ok(embeddings)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// `/embeddings` response format.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Deterministic local encoder based on token feature hashing.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets; the bucket counts are then L2-normalized. Identical
/// texts always produce identical vectors, and texts sharing tokens end up
/// closer than texts that share none. No network or model files needed.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    /// Create a hashing encoder producing vectors of the given length.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dimension as u64) as usize
    }

    fn encode_sync(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            embedding[self.bucket(token)] += 1.0;
        }
        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl Encoder for HashingEncoder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn model(&self) -> &str {
        "sha256-token-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        Ok(self.encode_sync(text))
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::squared_euclidean;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_hashing_encoder_is_deterministic() {
        let encoder = HashingEncoder::new(64);
        let a = encoder.encode("Nombre: B, insomnio por estrés").await.unwrap();
        let b = encoder.encode("Nombre: B, insomnio por estrés").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_eq!(squared_euclidean(&a, &b).unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_hashing_encoder_ignores_case_and_punctuation() {
        let encoder = HashingEncoder::new(32);
        let a = encoder.encode("Insomnio, ESTRÉS.").await.unwrap();
        let b = encoder.encode("insomnio estrés").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_encoder_empty_text() {
        let encoder = HashingEncoder::new(8);
        let v = encoder.encode("  ").await.unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_openai_encoder_requires_key() {
        let encoder = OpenAIEncoder::new();
        assert!(!encoder.is_available());
        assert!(matches!(
            encoder.encode("hola").await,
            Err(EmbeddingError::ProviderNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_openai_encoder_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
                "model": "tiny"
            })))
            .mount(&server)
            .await;

        let encoder = OpenAIEncoder::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_model("tiny", 3);

        let embedding = encoder.encode("paciente con insomnio").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_encoder_batch_reorders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [2.0, 2.0], "index": 1},
                    {"embedding": [1.0, 1.0], "index": 0}
                ],
                "model": "tiny"
            })))
            .mount(&server)
            .await;

        let encoder = OpenAIEncoder::new()
            .with_api_key("k")
            .with_base_url(server.uri())
            .with_model("tiny", 2);

        let texts = vec!["a".to_string(), "b".to_string()];
        let embeddings = encoder.encode_batch(&texts).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_openai_encoder_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2], "index": 0}],
                "model": "tiny"
            })))
            .mount(&server)
            .await;

        let encoder = OpenAIEncoder::new()
            .with_api_key("k")
            .with_base_url(server.uri())
            .with_model("tiny", 3);

        assert!(matches!(
            encoder.encode("x").await,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_openai_encoder_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let encoder = OpenAIEncoder::new()
            .with_api_key("k")
            .with_base_url(server.uri());

        assert!(matches!(
            encoder.encode("x").await,
            Err(EmbeddingError::RateLimited {
                retry_after_secs: 7
            })
        ));
    }

    #[tokio::test]
    async fn test_openai_encoder_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let encoder = OpenAIEncoder::new()
            .with_api_key("k")
            .with_base_url(server.uri());

        match encoder.encode("x").await {
            Err(EmbeddingError::ApiRequest(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
