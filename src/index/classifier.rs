//! Nearest-centroid label classifier over TF-IDF vectors

use crate::index::tfidf::{dot, normalize, SparseVector};
use crate::index::IndexError;
use ahash::AHashMap;
use std::collections::BTreeMap;

/// One unit centroid per label; a sample's score for a label is the cosine
/// similarity between its vector and the label centroid
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    centroids: Vec<(i64, SparseVector)>,
}

impl CentroidClassifier {
    /// Fit from `(vector, label id)` samples
    ///
    /// # Errors
    /// [`IndexError::InsufficientSamples`] with fewer than two samples or
    /// fewer than two distinct labels
    pub fn fit<'a>(
        name: &str,
        samples: impl IntoIterator<Item = (&'a SparseVector, i64)>,
    ) -> Result<Self, IndexError> {
        let mut sums: BTreeMap<i64, AHashMap<u32, f32>> = BTreeMap::new();
        let mut count = 0;

        for (vector, label) in samples {
            count += 1;
            let sum = sums.entry(label).or_default();
            for (term, weight) in vector {
                *sum.entry(*term).or_insert(0.0) += *weight;
            }
        }

        if count < 2 || sums.len() < 2 {
            return Err(IndexError::InsufficientSamples {
                label: name.to_string(),
                samples: count,
                labels: sums.len(),
            });
        }

        let centroids = sums
            .into_iter()
            .map(|(label, sum)| {
                let mut centroid: SparseVector = sum.into_iter().collect();
                centroid.sort_by_key(|(term, _)| *term);
                normalize(&mut centroid);
                (label, centroid)
            })
            .collect();

        Ok(Self { centroids })
    }

    /// All labels by descending score, ties by ascending label id
    pub fn rank(&self, vector: &SparseVector) -> Vec<(i64, f32)> {
        let mut ranked: Vec<(i64, f32)> = self
            .centroids
            .iter()
            .map(|(label, centroid)| (*label, dot(vector, centroid)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    pub fn labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.centroids.iter().map(|(label, _)| *label)
    }
}
