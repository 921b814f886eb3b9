//! End-to-end retrieval over a small clinical corpus.

use std::sync::Arc;

use async_trait::async_trait;
use casebook_embeddings::{Embedding, Encoder, VectorIndex};
use casebook_retrieval::{Corpus, IndexArtifact, RetrievalError, Retriever};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const VOCABULARY: [&str; 6] = ["ansiedad", "examen", "insomnio", "estrés", "dolor", "crónico"];

/// Bag-of-words over a fixed vocabulary, so distances are easy to reason about.
struct KeywordEncoder;

#[async_trait]
impl Encoder for KeywordEncoder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "fixed-vocabulary"
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    async fn encode(&self, text: &str) -> casebook_embeddings::Result<Embedding> {
        let lowered = text.to_lowercase();
        Ok(VOCABULARY
            .iter()
            .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
            .collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn cases() -> Vec<String> {
    vec![
        "Nombre: A, ansiedad por examen".to_string(),
        "Nombre: B, insomnio por estrés laboral".to_string(),
        "Nombre: C, dolor crónico".to_string(),
    ]
}

async fn build_retriever() -> Retriever {
    let encoder = Arc::new(KeywordEncoder);
    let vectors = encoder.encode_batch(&cases()).await.unwrap();
    let index = VectorIndex::build(encoder.dimension(), vectors).unwrap();
    Retriever::new(encoder, index, Corpus::from_texts(cases())).unwrap()
}

#[tokio::test]
async fn test_insomnia_query_retrieves_case_b() {
    let retriever = build_retriever().await;

    let results = retriever.search("paciente con insomnio", 1).await.unwrap();
    assert_eq!(results, vec!["Nombre: B, insomnio por estrés laboral".to_string()]);
}

#[tokio::test]
async fn test_index_cardinality_matches_corpus() {
    let retriever = build_retriever().await;
    assert_eq!(retriever.index().cardinality(), retriever.corpus().len());
}

#[tokio::test]
async fn test_over_asking_returns_whole_corpus() {
    let retriever = build_retriever().await;
    let results = retriever.search_cases("dolor", 10).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].case_id, 2);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn test_artifact_round_trip_serves_same_results() {
    let temp_dir = TempDir::new().unwrap();
    let index_path = temp_dir.path().join("patient_cases.index.json");
    let cases_path = temp_dir.path().join("patient_cases.json");

    let original = build_retriever().await;
    IndexArtifact::new(original.index().clone(), original.corpus().clone())
        .unwrap()
        .save(&index_path, &cases_path)
        .await
        .unwrap();

    let artifact = IndexArtifact::load(&index_path, &cases_path).await.unwrap();
    let reloaded = Retriever::from_artifact(Arc::new(KeywordEncoder), artifact).unwrap();

    assert_eq!(
        reloaded.search("ansiedad", 3).await.unwrap(),
        original.search("ansiedad", 3).await.unwrap()
    );
}

#[tokio::test]
async fn test_truncated_corpus_file_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let index_path = temp_dir.path().join("patient_cases.index.json");
    let cases_path = temp_dir.path().join("patient_cases.json");

    let original = build_retriever().await;
    tokio::fs::write(&index_path, original.index().to_json().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&cases_path, r#"["Nombre: A, ansiedad por examen"]"#)
        .await
        .unwrap();

    assert!(matches!(
        IndexArtifact::load(&index_path, &cases_path).await,
        Err(RetrievalError::CorpusMismatch {
            vectors: 3,
            cases: 1
        })
    ));
}
