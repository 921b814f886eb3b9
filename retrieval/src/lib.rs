//! # Case Retrieval
//!
//! Turns a free-text query into a ranked list of case narratives.
//!
//! - **Corpus**: the ordered, immutable list of case texts
//! - **Artifacts**: the persisted index + corpus pair, validated on load
//! - **Retriever**: encoder + vector index + corpus
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Retriever                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  query ──► Encoder ──► VectorIndex::search ──► Corpus lookup    │
//! │                              │                      │           │
//! │                              ▼                      ▼           │
//! │                       (case_id, dist)  ──►   ranked case texts  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casebook_retrieval::{IndexArtifact, Retriever};
//!
//! let artifact = IndexArtifact::load("models/cases.index.json", "models/cases.json").await?;
//! let retriever = Retriever::from_artifact(encoder, artifact)?;
//! let cases = retriever.search("paciente con insomnio", 5).await?;
//! ```

pub mod artifact;
pub mod config;
pub mod corpus;
pub mod error;
pub mod retriever;

pub use artifact::IndexArtifact;
pub use config::{EmbeddingConfig, EncoderType, RetrievalConfig};
pub use corpus::{Case, Corpus};
pub use error::{Result, RetrievalError};
pub use retriever::{RetrievedCase, Retriever};

// Re-export from dependencies for convenience
pub use casebook_embeddings::{Encoder, Neighbor, VectorIndex};
