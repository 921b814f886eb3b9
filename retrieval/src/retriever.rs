//! Query retriever.

use std::sync::Arc;

use casebook_embeddings::{EmbeddingError, Encoder, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::{IndexArtifact, check_alignment};
use crate::corpus::Corpus;
use crate::error::Result;

/// Number of cases returned when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 5;

/// A case returned by a search, with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCase {
    pub case_id: usize,
    pub text: String,
    pub distance: f32,
}

/// Encodes a query, searches the vector index and maps hits back to case
/// texts.
///
/// The retriever never mutates the index or the corpus. Share one instance
/// across conversations through an `Arc`.
pub struct Retriever {
    encoder: Arc<dyn Encoder>,
    index: VectorIndex,
    corpus: Corpus,
    default_k: usize,
}

impl Retriever {
    /// Create a retriever, checking that the index, corpus and encoder agree.
    pub fn new(encoder: Arc<dyn Encoder>, index: VectorIndex, corpus: Corpus) -> Result<Self> {
        check_alignment(&index, &corpus)?;

        if encoder.dimension() != index.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: index.dimension(),
                actual: encoder.dimension(),
            }
            .into());
        }

        Ok(Self {
            encoder,
            index,
            corpus,
            default_k: DEFAULT_TOP_K,
        })
    }

    /// Create a retriever from a loaded artifact.
    pub fn from_artifact(encoder: Arc<dyn Encoder>, artifact: IndexArtifact) -> Result<Self> {
        Self::new(encoder, artifact.index, artifact.corpus)
    }

    /// Set the number of cases [`Retriever::search_default`] returns.
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k.max(1);
        self
    }

    /// The configured default `k`.
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// The corpus this retriever serves.
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The underlying vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Return up to `k` case texts, most similar first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_cases(query, k)
            .await?
            .into_iter()
            .map(|c| c.text)
            .collect())
    }

    /// [`Retriever::search`] with the configured default `k`.
    pub async fn search_default(&self, query: &str) -> Result<Vec<String>> {
        self.search(query, self.default_k).await
    }

    /// Return up to `k` cases with ids and distances, most similar first.
    ///
    /// Hits that do not map to a case are skipped rather than reported.
    pub async fn search_cases(&self, query: &str, k: usize) -> Result<Vec<RetrievedCase>> {
        let query_vector = self.encoder.encode(query).await?;
        let neighbors = self.index.search(&query_vector, k)?;

        let cases: Vec<RetrievedCase> = neighbors
            .into_iter()
            .filter_map(|n| {
                self.corpus.get(n.case_id).map(|case| RetrievedCase {
                    case_id: case.id,
                    text: case.text.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        debug!("Retrieved {} cases for query (k = {k})", cases.len());
        Ok(cases)
    }
}
