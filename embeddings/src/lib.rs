//! # Embeddings
//!
//! Text encoders and exact nearest-neighbor search for the casebook
//! retrieval core.
//!
//! ## Features
//!
//! - **Encoders**: Convert text to dense vectors (HTTP API or local hashing)
//! - **Vector Index**: Exact squared-L2 search over a position-aligned set of vectors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Encoder ──► Embedding ──► VectorIndex ──► Neighbor            │
//! │     │                          │                                │
//! │     ▼                          ▼                                │
//! │  OpenAI / Hashing      squared_euclidean                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use index::{Neighbor, VectorIndex};
pub use provider::{Encoder, HashingEncoder, OpenAIEncoder};
pub use similarity::{normalize, squared_euclidean};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;
