//! Configuration for case retrieval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use casebook_embeddings::{Encoder, HashingEncoder, OpenAIEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::IndexArtifact;
use crate::error::{Result, RetrievalError};
use crate::retriever::{DEFAULT_TOP_K, Retriever};

/// Separator placed between retrieved cases when they are joined into one
/// context string.
pub const DEFAULT_CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Configuration for the retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Path to the serialized vector index.
    pub index_path: PathBuf,

    /// Path to the JSON array of case texts.
    pub cases_path: PathBuf,

    /// Number of cases to retrieve per query.
    pub top_k: usize,

    /// Separator used when joining retrieved cases into a context.
    pub context_separator: String,

    /// Encoder configuration.
    pub embedding: EmbeddingConfig,
}

impl RetrievalConfig {
    /// Create a configuration for the given artifact files.
    pub fn new(index_path: impl Into<PathBuf>, cases_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            cases_path: cases_path.into(),
            top_k: DEFAULT_TOP_K,
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Set the number of cases to retrieve.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the encoder configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Load the artifacts and build a retriever.
    pub async fn build_retriever(&self) -> Result<Retriever> {
        if self.top_k == 0 {
            return Err(RetrievalError::Config("top_k must be at least 1".to_string()));
        }

        let encoder = self.embedding.build_encoder()?;
        let artifact = IndexArtifact::load(&self.index_path, &self.cases_path).await?;
        let retriever = Retriever::from_artifact(encoder, artifact)?.with_default_k(self.top_k);

        info!(
            "Retriever ready: {} cases, top_k = {}",
            retriever.corpus().len(),
            self.top_k
        );
        Ok(retriever)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new("models/patient_cases.index.json", "models/patient_cases.json")
    }
}

/// Configuration for the query encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which encoder to use.
    pub provider: EncoderType,

    /// Model to use for embeddings.
    pub model: String,

    /// Vector length the model produces; must match the index.
    pub dimension: usize,

    /// API base URL.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EncoderType::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimension: casebook_embeddings::DEFAULT_DIMENSION,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Local hashing encoder of the given dimension.
    pub fn hashing(dimension: usize) -> Self {
        Self {
            provider: EncoderType::Hashing,
            dimension,
            ..Default::default()
        }
    }

    /// Construct the configured encoder.
    pub fn build_encoder(&self) -> Result<Arc<dyn Encoder>> {
        if self.dimension == 0 {
            return Err(RetrievalError::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }

        match self.provider {
            EncoderType::Hashing => Ok(Arc::new(HashingEncoder::new(self.dimension))),
            EncoderType::OpenAi => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.timeout_secs))
                    .build()
                    .map_err(|e| RetrievalError::Config(format!("http client: {e}")))?;

                let mut encoder = OpenAIEncoder::new()
                    .with_client(client)
                    .with_base_url(&self.base_url)
                    .with_model(&self.model, self.dimension);
                if let Ok(key) = std::env::var(&self.api_key_env) {
                    encoder = encoder.with_api_key(key);
                }
                Ok(Arc::new(encoder))
            }
        }
    }
}

/// Type of query encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderType {
    /// OpenAI-compatible embeddings API.
    OpenAi,
    /// Local token hashing (no network).
    Hashing,
}
