//! Persisted index artifacts.
//!
//! An artifact is two files sharing one positional ordering:
//!
//! - the vector index, as `{"dimension": D, "vectors": [[...], ...]}`
//! - the corpus, as a JSON array of case texts
//!
//! Both are required. Loading fails before anything is served if the vector
//! count and the case count disagree.

use std::path::{Path, PathBuf};

use casebook_embeddings::VectorIndex;
use tokio::fs;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::error::{Result, RetrievalError};

/// A vector index together with the corpus it was built from.
#[derive(Debug, Clone)]
pub struct IndexArtifact {
    pub index: VectorIndex,
    pub corpus: Corpus,
}

impl IndexArtifact {
    /// Pair an index with its corpus, checking that they line up.
    pub fn new(index: VectorIndex, corpus: Corpus) -> Result<Self> {
        check_alignment(&index, &corpus)?;
        Ok(Self { index, corpus })
    }

    /// Load both files and validate them against each other.
    pub async fn load(index_path: impl AsRef<Path>, cases_path: impl AsRef<Path>) -> Result<Self> {
        let index_path = index_path.as_ref();
        let cases_path = cases_path.as_ref();

        let index_json = fs::read_to_string(index_path)
            .await
            .map_err(|e| RetrievalError::Artifact(format!("{}: {e}", index_path.display())))?;
        let cases_json = fs::read_to_string(cases_path)
            .await
            .map_err(|e| RetrievalError::Artifact(format!("{}: {e}", cases_path.display())))?;

        let index = VectorIndex::from_json(&index_json)?;
        let texts: Vec<String> = serde_json::from_str(&cases_json)?;
        let corpus = Corpus::from_texts(texts);

        let artifact = Self::new(index, corpus)?;
        info!(
            "Loaded index artifact: {} cases, dimension {}",
            artifact.corpus.len(),
            artifact.index.dimension()
        );
        Ok(artifact)
    }

    /// Write both files, creating parent directories as needed.
    pub async fn save(
        &self,
        index_path: impl AsRef<Path>,
        cases_path: impl AsRef<Path>,
    ) -> Result<()> {
        let index_path = index_path.as_ref();
        let cases_path = cases_path.as_ref();

        for path in [index_path, cases_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
        }

        write_atomic(index_path, &self.index.to_json()?).await?;
        write_atomic(cases_path, &serde_json::to_string_pretty(&self.corpus.texts())?).await?;

        debug!(
            "Saved index artifact to {} and {}",
            index_path.display(),
            cases_path.display()
        );
        Ok(())
    }
}

/// Corpus length must equal index cardinality.
pub(crate) fn check_alignment(index: &VectorIndex, corpus: &Corpus) -> Result<()> {
    if index.cardinality() != corpus.len() {
        return Err(RetrievalError::CorpusMismatch {
            vectors: index.cardinality(),
            cases: corpus.len(),
        });
    }
    Ok(())
}

/// Write through a sibling temp file and a rename, so readers never see a
/// partial file.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, content)
        .await
        .map_err(|e| RetrievalError::Artifact(format!("{}: {e}", temp_path.display())))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| RetrievalError::Artifact(format!("{}: {e}", path.display())))?;
    Ok(())
}
