//! Configuration for a complete casebook conversation.
//!
//! Read from TOML. Every section and field has a default, so an empty file
//! is a valid configuration:
//!
//! ```toml
//! [retrieval]
//! index_path = "models/patient_cases.index.json"
//! cases_path = "models/patient_cases.json"
//! top_k = 5
//!
//! [generator]
//! model = "gemini-2.5-flash"
//! api_key_env = "GOOGLE_API_KEY"
//!
//! [dialogue]
//! mode = "agent"
//! max_agent_steps = 6
//!
//! [checkpoint]
//! backend = "file"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use casebook_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::controller::{
    DEFAULT_MAX_AGENT_STEPS, DEFAULT_STEP_LIMIT_MESSAGE, DEFAULT_UNAVAILABLE_MESSAGE,
    DialogueController, DialogueMode,
};
use crate::conversation::Conversation;
use crate::error::{DialogueError, Result};
use crate::generator::Generator;
use crate::llm::{ChatCompletionsGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_RAG_TEMPLATE};
use crate::tools::{CaseRetrievalTool, default_registry};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CasebookConfig {
    /// Retriever and encoder.
    pub retrieval: RetrievalConfig,

    /// Text generator.
    pub generator: GeneratorConfig,

    /// Dialogue flow.
    pub dialogue: DialogueConfig,

    /// Thread persistence.
    pub checkpoint: CheckpointConfig,
}

impl CasebookConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DialogueError::Config(e.to_string()))
    }

    /// Load a TOML file.
    ///
    /// A `.env` file in the working directory (or a parent) is loaded first,
    /// so API keys can live there instead of the environment.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            warn!("Failed to load .env: {e}");
        }

        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DialogueError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Build every service and wire them into a conversation.
    pub async fn build_conversation(&self) -> Result<Conversation> {
        let generator: Arc<dyn Generator> = Arc::new(self.generator.build_generator()?);
        self.build_conversation_with(generator).await
    }

    /// Like [`CasebookConfig::build_conversation`], with a caller-supplied
    /// generator.
    pub async fn build_conversation_with(
        &self,
        generator: Arc<dyn Generator>,
    ) -> Result<Conversation> {
        if self.dialogue.max_agent_steps == 0 {
            return Err(DialogueError::Config(
                "max_agent_steps must be at least 1".to_string(),
            ));
        }

        let retriever = Arc::new(self.retrieval.build_retriever().await?);
        let controller = match self.dialogue.mode {
            DialogueMode::Rag => DialogueController::rag(retriever, generator),
            DialogueMode::Agent => {
                let case_retrieval = CaseRetrievalTool::new(retriever, Arc::clone(&generator))
                    .with_top_k(self.retrieval.top_k)
                    .with_context_separator(&self.retrieval.context_separator);
                let tools = default_registry(case_retrieval)?;
                DialogueController::agent(Arc::new(tools), generator)
            }
        }
        .with_top_k(self.retrieval.top_k)
        .with_context_separator(&self.retrieval.context_separator)
        .with_max_agent_steps(self.dialogue.max_agent_steps)
        .with_unavailable_message(&self.dialogue.unavailable_message)
        .with_step_limit_message(&self.dialogue.step_limit_message);

        let store = self.checkpoint.build_store().await?;
        info!("Conversation ready in {:?} mode", self.dialogue.mode);
        Ok(Conversation::new(controller, store))
    }
}

/// Configuration for the chat completions generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Model name.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Grounded-answer template with `{history}`, `{context}` and
    /// `{question}` placeholders.
    pub rag_template: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: None,
            timeout_secs: 60,
            rag_template: DEFAULT_RAG_TEMPLATE.to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Construct the configured generator.
    pub fn build_generator(&self) -> Result<ChatCompletionsGenerator> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| DialogueError::Config(format!("http client: {e}")))?;

        let mut generator = ChatCompletionsGenerator::new()
            .with_client(client)
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_rag_template(&self.rag_template);
        if let Some(temperature) = self.temperature {
            generator = generator.with_temperature(temperature);
        }

        match std::env::var(&self.api_key_env) {
            Ok(key) => generator = generator.with_api_key(key),
            Err(_) => warn!(
                "{} is not set; generator calls will fail",
                self.api_key_env
            ),
        }
        Ok(generator)
    }
}

/// Configuration for the dialogue flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Which flow to run.
    pub mode: DialogueMode,

    /// Bound on agent steps per turn.
    pub max_agent_steps: usize,

    /// Reply when retrieval or generation fails.
    pub unavailable_message: String,

    /// Reply when the agent runs out of steps.
    pub step_limit_message: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            mode: DialogueMode::default(),
            max_agent_steps: DEFAULT_MAX_AGENT_STEPS,
            unavailable_message: DEFAULT_UNAVAILABLE_MESSAGE.to_string(),
            step_limit_message: DEFAULT_STEP_LIMIT_MESSAGE.to_string(),
        }
    }
}

/// Where checkpoints are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    /// In-process only.
    #[default]
    Memory,
    /// JSON files on disk.
    File,
}

/// Configuration for thread persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Storage backend.
    pub backend: CheckpointBackend,

    /// Directory for the file backend; the user data directory when unset.
    pub dir: Option<PathBuf>,
}

impl CheckpointConfig {
    /// Construct the configured store.
    pub async fn build_store(&self) -> Result<Arc<dyn CheckpointStore>> {
        match self.backend {
            CheckpointBackend::Memory => Ok(Arc::new(MemoryCheckpointStore::new())),
            CheckpointBackend::File => {
                let dir = self
                    .dir
                    .clone()
                    .or_else(FileCheckpointStore::default_dir)
                    .ok_or_else(|| {
                        DialogueError::Config("no checkpoint directory available".to_string())
                    })?;
                Ok(Arc::new(FileCheckpointStore::new(dir).await?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_retrieval::EncoderType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = CasebookConfig::from_toml_str("").unwrap();
        assert_eq!(config.dialogue.mode, DialogueMode::Rag);
        assert_eq!(config.dialogue.max_agent_steps, 6);
        assert_eq!(config.generator.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_parse_sections() {
        let config = CasebookConfig::from_toml_str(
            r#"
            [retrieval]
            top_k = 3

            [retrieval.embedding]
            provider = "hashing"
            dimension = 64

            [generator]
            model = "gemini-2.5-pro"
            temperature = 0.2

            [dialogue]
            mode = "agent"
            max_agent_steps = 4

            [checkpoint]
            backend = "file"
            dir = "/tmp/threads"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.embedding.provider, EncoderType::Hashing);
        assert_eq!(config.generator.model, "gemini-2.5-pro");
        assert_eq!(config.generator.temperature, Some(0.2));
        assert_eq!(config.dialogue.mode, DialogueMode::Agent);
        assert_eq!(config.checkpoint.dir, Some(PathBuf::from("/tmp/threads")));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            CasebookConfig::from_toml_str("[dialogue]\nmode = \"telepathy\""),
            Err(DialogueError::Config(_))
        ));
    }

    #[test]
    fn test_generator_builds_without_key() {
        let config = GeneratorConfig {
            api_key_env: "CASEBOOK_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(!config.build_generator().unwrap().is_available());
    }
}
