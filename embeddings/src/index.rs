//! Exact nearest-neighbor index over a position-aligned set of vectors.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::squared_euclidean;

/// A search hit: the position of a stored vector and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Position of the vector in the index, which is also the case id.
    pub case_id: usize,

    /// Squared euclidean distance to the query.
    pub distance: f32,
}

/// A flat, exact search structure.
///
/// Vector `i` stays associated with id `i` for the lifetime of the index.
/// There is no insert or remove after [`VectorIndex::build`]; the index is
/// meant to be wrapped in an `Arc` and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    /// Dimension every stored and query vector must have.
    dimension: usize,

    /// Stored vectors, in insertion order.
    vectors: Vec<Embedding>,
}

/// On-disk representation of a [`VectorIndex`].
#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    dimension: usize,
    vectors: Vec<Embedding>,
}

impl VectorIndex {
    /// Build an index over exactly the given vectors, in order.
    pub fn build(dimension: usize, vectors: Vec<Embedding>) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbeddingError::ZeroDimension);
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        debug!(
            "Built vector index with {} vectors of dimension {dimension}",
            vectors.len()
        );
        Ok(Self { dimension, vectors })
    }

    /// Number of stored vectors.
    pub fn cardinality(&self) -> usize {
        self.vectors.len()
    }

    /// Dimension of stored vectors.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Get the vector stored at a position.
    pub fn get(&self, case_id: usize) -> Option<&Embedding> {
        self.vectors.get(case_id)
    }

    /// Return the `k` nearest vectors to `query`, closest first.
    ///
    /// Ties are broken by ascending id. If the index holds fewer than `k`
    /// vectors, all of them are returned.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(OrderedFloat<f32>, usize)> = Vec::with_capacity(self.vectors.len());
        for (case_id, vector) in self.vectors.iter().enumerate() {
            let distance = squared_euclidean(query, vector)?;
            scored.push((OrderedFloat(distance), case_id));
        }

        // Tuple ordering gives ascending distance, then ascending id.
        scored.sort_unstable();

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, case_id)| Neighbor {
                case_id,
                distance: distance.0,
            })
            .collect())
    }

    /// Serialize the index to JSON.
    pub fn to_json(&self) -> Result<String> {
        let blob = IndexBlob {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
        };
        Ok(serde_json::to_string(&blob)?)
    }

    /// Load an index from JSON, validating every stored vector.
    pub fn from_json(json: &str) -> Result<Self> {
        let blob: IndexBlob = serde_json::from_str(json)?;
        let index = Self::build(blob.dimension, blob.vectors)?;
        info!(
            "Loaded {} vectors (dimension {}) into index",
            index.cardinality(),
            index.dimension()
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            2,
            vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 3.0],
                vec![1.0, 0.0],
            ],
        )
        .unwrap()
    }

    fn ids(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|n| n.case_id).collect()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[0.0, 2.0], 4).unwrap();

        assert_eq!(ids(&hits), vec![2, 0, 1, 3]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[0].distance, 1.0);
    }

    #[test]
    fn test_ties_prefer_lower_id() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(ids(&hits), vec![1, 3]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 0.0);
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 10).unwrap();

        assert_eq!(hits.len(), index.cardinality());
        assert!(hits.iter().all(|n| n.case_id < index.cardinality()));
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index();
        let result = index.search(&[1.0, 0.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_build_rejects_ragged_vectors() {
        let result = VectorIndex::build(3, vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_build_rejects_zero_dimension() {
        assert!(matches!(
            VectorIndex::build(0, Vec::new()),
            Err(EmbeddingError::ZeroDimension)
        ));
    }

    #[test]
    fn test_empty_index_search() {
        let index = VectorIndex::build(4, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn test_json_round_trip_preserves_positions() {
        let index = sample_index();
        let json = index.to_json().unwrap();
        let loaded = VectorIndex::from_json(&json).unwrap();

        assert_eq!(loaded, index);
        assert_eq!(loaded.get(2), Some(&vec![0.0, 3.0]));
    }

    #[test]
    fn test_from_json_rejects_bad_vector() {
        let json = r#"{"dimension": 2, "vectors": [[1.0, 2.0], [1.0]]}"#;
        assert!(matches!(
            VectorIndex::from_json(json),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }
}
