use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum VectorizeError {
    #[error("empty vocabulary; documents contain no indexable terms")]
    EmptyVocabulary,
}

/// TF-IDF vectors fitted over a small, fixed set of documents.
///
/// Terms are whitespace tokens of at least two characters. Weights use raw term counts and a
/// smoothed inverse document frequency `ln((1 + n) / (1 + df)) + 1`, and every row is L2
/// normalized, so the dot product of two rows is their cosine similarity.
#[derive(Debug)]
pub(crate) struct TfIdfMatrix {
    rows: Vec<Vec<f64>>,
}

impl TfIdfMatrix {
    pub(crate) fn fit(documents: &[&str]) -> Result<Self, VectorizeError> {
        let tokenized: Vec<Vec<&str>> = documents.iter().map(|doc| terms(doc)).collect();

        let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &tokenized {
            for term in doc {
                vocabulary.entry(*term).or_insert(0);
            }
        }
        if vocabulary.is_empty() {
            return Err(VectorizeError::EmptyVocabulary);
        }
        for (position, slot) in vocabulary.values_mut().enumerate() {
            *slot = position;
        }

        let mut document_frequency = vec![0_usize; vocabulary.len()];
        let mut counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(tokenized.len());
        for doc in &tokenized {
            let mut tf: HashMap<usize, usize> = HashMap::new();
            for term in doc {
                if let Some(&column) = vocabulary.get(term) {
                    *tf.entry(column).or_insert(0) += 1;
                }
            }
            for column in tf.keys() {
                document_frequency[*column] += 1;
            }
            counts.push(tf);
        }

        let n = documents.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|df| ((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|tf| {
                let mut row = vec![0.0; vocabulary.len()];
                for (column, count) in tf {
                    row[column] = count as f64 * idf[column];
                }
                l2_normalize(&mut row);
                row
            })
            .collect();

        Ok(Self { rows })
    }

    pub(crate) fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cosine similarity between two fitted documents, in [0, 1].
    pub(crate) fn cosine(&self, left: usize, right: usize) -> f64 {
        match (self.row(left), self.row(right)) {
            (Some(a), Some(b)) => cosine(a, b),
            _ => 0.0,
        }
    }
}

pub(crate) fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn terms(document: &str) -> Vec<&str> {
    document.split_whitespace().filter(|token| token.chars().count() >= 2).collect()
}

fn l2_normalize(row: &mut [f64]) {
    let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in row.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_documents_have_unit_similarity() {
        let matrix = TfIdfMatrix::fit(&["force equals mass", "force equals mass"]).expect("fit");
        assert!((matrix.cosine(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_documents_have_zero_similarity() {
        let matrix = TfIdfMatrix::fit(&["photosynthesis plants", "gravity planets"]).expect("fit");
        assert_eq!(matrix.cosine(0, 1), 0.0);
    }

    #[test]
    fn empty_vocabulary_is_reported() {
        assert_eq!(TfIdfMatrix::fit(&["", "a b"]).unwrap_err(), VectorizeError::EmptyVocabulary);
    }

    #[test]
    fn one_empty_document_scores_zero() {
        let matrix = TfIdfMatrix::fit(&["", "gravity planets"]).expect("fit");
        assert_eq!(matrix.cosine(0, 1), 0.0);
    }

    #[test]
    fn cosine_is_symmetric() {
        let pairs = [
            ("global warming caused pollution deforestation", "pollution causes warming"),
            ("cell membrane controls transport", "membrane cell wall plant"),
        ];
        for (left, right) in pairs {
            let forward = TfIdfMatrix::fit(&[left, right]).expect("fit").cosine(0, 1);
            let backward = TfIdfMatrix::fit(&[right, left]).expect("fit").cosine(0, 1);
            assert!((forward - backward).abs() < 1e-12);
        }
    }

    #[test]
    fn shared_terms_are_downweighted_against_unique_terms() {
        let matrix = TfIdfMatrix::fit(&["energy mass light", "energy heat"]).expect("fit");
        let similarity = matrix.cosine(0, 1);
        assert!(similarity > 0.0 && similarity < 0.5, "similarity = {similarity}");
    }
}
