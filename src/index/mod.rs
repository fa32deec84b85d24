//! Similarity index over record sides
//!
//! - [`SimilarityIndex`] is the capability the search pipeline consumes
//! - [`TfidfIndex`] is the bundled implementation (TF-IDF space plus
//!   nearest-centroid label classifiers)
//! - [`IndexHandle`] holds the installed snapshot; rebuilds swap it whole
//! - [`IndexRefresher`] rebuilds from the record store after mutations

mod classifier;
mod refresh;
mod tfidf;

pub use classifier::CentroidClassifier;
pub use refresh::{subtopic_label, IndexRefresher, RefreshOutcome, TOPIC_LABEL};
pub use tfidf::TfidfIndex;

use crate::records::SideId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("No indexable text in corpus")]
    EmptyCorpus,

    #[error("Seed {0} is not indexed")]
    SeedNotIndexed(SideId),

    #[error("Classifier not found: {0}")]
    ClassifierNotFound(String),

    #[error("Not enough samples to train '{label}': {samples} samples, {labels} labels")]
    InsufficientSamples {
        label: String,
        samples: usize,
        labels: usize,
    },
}

/// Reference point of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seed<'a> {
    /// An indexed record side
    Side(SideId),
    /// Text that is not part of the corpus
    Text(&'a str),
}

/// A candidate returned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub side: SideId,
    /// Non-negative; lower is more similar
    pub distance: f32,
    pub matched_terms: Vec<String>,
}

/// Nearest-neighbour search and label classification over record sides
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` members of `universe` nearest to `seed`, excluding those
    /// farther than `max_distance`, ordered by (distance, side id)
    fn nearest(
        &self,
        seed: &Seed<'_>,
        universe: &[SideId],
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<RawHit>, IndexError>;

    /// Candidate label ids for `side` under classifier `label`, by
    /// descending score
    fn classify(&self, label: &str, side: SideId) -> Result<Vec<(i64, f32)>, IndexError>;

    fn has_classifier(&self, label: &str) -> bool;

    /// Number of indexed sides
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide slot for the installed index snapshot
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<dyn SimilarityIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The installed snapshot, if any index was ever built
    pub fn snapshot(&self) -> Option<Arc<dyn SimilarityIndex>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the installed snapshot; readers holding the old one keep it
    pub fn install(&self, index: Arc<dyn SimilarityIndex>) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(index);
    }

    pub fn is_installed(&self) -> bool {
        self.snapshot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl SimilarityIndex for Fixed {
        fn nearest(
            &self,
            _seed: &Seed<'_>,
            _universe: &[SideId],
            _k: usize,
            _max_distance: f32,
        ) -> Result<Vec<RawHit>, IndexError> {
            Ok(Vec::new())
        }

        fn classify(&self, label: &str, _side: SideId) -> Result<Vec<(i64, f32)>, IndexError> {
            Err(IndexError::ClassifierNotFound(label.to_string()))
        }

        fn has_classifier(&self, _label: &str) -> bool {
            false
        }

        fn len(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_empty_handle() {
        let handle = IndexHandle::new();
        assert!(!handle.is_installed());
        assert!(handle.snapshot().is_none());
    }

    #[test]
    fn test_reader_keeps_snapshot_across_swap() {
        let handle = IndexHandle::new();
        handle.install(Arc::new(Fixed(1)));

        let held = handle.snapshot().unwrap();
        handle.install(Arc::new(Fixed(2)));

        assert_eq!(held.len(), 1);
        assert_eq!(handle.snapshot().unwrap().len(), 2);
    }
}
