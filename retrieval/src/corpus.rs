//! The case corpus.

use serde::{Deserialize, Serialize};

/// One clinical case narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Position in the corpus and in the vector index.
    pub id: usize,

    /// Raw case text.
    pub text: String,
}

/// Ordered, immutable sequence of cases. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    cases: Vec<Case>,
}

impl Corpus {
    /// Build a corpus from texts; ids are assigned by position.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cases = texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| Case {
                id,
                text: text.into(),
            })
            .collect();
        Self { cases }
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Check if the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Look up a case by id. Out-of-range ids yield `None`.
    pub fn get(&self, id: usize) -> Option<&Case> {
        self.cases.get(id)
    }

    /// Iterate over cases in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Case> {
        self.cases.iter()
    }

    /// Case texts in id order.
    pub fn texts(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.text.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_follow_position() {
        let corpus = Corpus::from_texts(["a", "b", "c"]);
        assert_eq!(corpus.len(), 3);
        for (i, case) in corpus.iter().enumerate() {
            assert_eq!(case.id, i);
        }
        assert_eq!(corpus.get(1).map(|c| c.text.as_str()), Some("b"));
    }

    #[test]
    fn test_out_of_range_lookup() {
        let corpus = Corpus::from_texts(["only"]);
        assert!(corpus.get(1).is_none());
        assert!(corpus.get(usize::MAX).is_none());
    }
}
