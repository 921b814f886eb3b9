//! Error types for case retrieval.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval layer.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Index and corpus disagree on the number of cases.
    #[error("corpus mismatch: index holds {vectors} vectors but corpus has {cases} cases")]
    CorpusMismatch { vectors: usize, cases: usize },

    /// Embedding or vector search error (including dimension mismatches).
    #[error("embedding error: {0}")]
    Embedding(#[from] casebook_embeddings::EmbeddingError),

    /// Index or corpus file could not be read or written.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
