//! Rebuild of the similarity index and label classifiers after mutations

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::index::{IndexHandle, SimilarityIndex, TfidfIndex};
use crate::records::{CategoryKind, Question, SideId};
use crate::retrieval::Predicate;
use crate::storage::RecordStore;
use ahash::AHashMap;
use std::sync::Arc;

/// Name of the record → topic classifier
pub const TOPIC_LABEL: &str = "topics";

/// Name of the record → subtopic classifier scoped to one topic
pub fn subtopic_label(topic_id: i64) -> String {
    format!("{}_subtopics", topic_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was installed
    Installed {
        documents: usize,
        classifiers: Vec<String>,
    },
    /// The build failed; whatever was installed before stays
    KeptPrevious,
}

/// Builds a fresh [`TfidfIndex`] from the store and swaps it into the handle
pub struct IndexRefresher {
    handle: Arc<IndexHandle>,
    classifier: ClassifierConfig,
    max_matched_terms: usize,
}

impl IndexRefresher {
    pub fn new(
        handle: Arc<IndexHandle>,
        classifier: ClassifierConfig,
        max_matched_terms: usize,
    ) -> Self {
        Self {
            handle,
            classifier,
            max_matched_terms,
        }
    }

    /// Rebuild and install; never fails, failures are logged
    pub fn refresh(&self, store: &dyn RecordStore) -> RefreshOutcome {
        match self.build(store) {
            Ok(index) => {
                let outcome = RefreshOutcome::Installed {
                    documents: index.len(),
                    classifiers: index.classifier_labels(),
                };
                self.handle.install(Arc::new(index));
                tracing::info!("Installed similarity index: {:?}", outcome);
                outcome
            }
            Err(e) => {
                tracing::warn!("Index rebuild failed, keeping previous index: {}", e);
                RefreshOutcome::KeptPrevious
            }
        }
    }

    /// Build a complete index without installing it.
    ///
    /// Only the primary space is required; classifiers that cannot be
    /// trained are left out.
    pub fn build(&self, store: &dyn RecordStore) -> Result<TfidfIndex> {
        let questions = store.filter_by_predicate(&Predicate::always())?;

        let mut documents = Vec::with_capacity(questions.len() * 2);
        for q in &questions {
            let question_text = q.question_text();
            if !question_text.is_empty() {
                documents.push((SideId::question(q.id), question_text));
            }
            let answer_text = q.answer_text();
            if !answer_text.is_empty() {
                documents.push((SideId::answer(q.id), answer_text));
            }
        }

        let mut index = TfidfIndex::build(&documents, self.max_matched_terms)?;

        let topic_samples: Vec<(SideId, i64)> = questions
            .iter()
            .filter_map(|q| q.topic.as_ref().map(|t| (SideId::question(q.id), t.id)))
            .collect();
        if let Err(e) = index.train_classifier(TOPIC_LABEL, &topic_samples) {
            tracing::warn!("Skipping topic classifier: {}", e);
        }

        self.train_subtopic_classifiers(&mut index, store, &questions)?;

        Ok(index)
    }

    fn train_subtopic_classifiers(
        &self,
        index: &mut TfidfIndex,
        store: &dyn RecordStore,
        questions: &[Question],
    ) -> Result<()> {
        let mut per_topic: AHashMap<i64, Vec<&Question>> = AHashMap::new();
        for q in questions {
            if let Some(topic) = &q.topic {
                per_topic.entry(topic.id).or_default().push(q);
            }
        }

        for topic in store.all_of(CategoryKind::Topic)? {
            if topic.name.chars().count() < self.classifier.min_topic_name_len {
                continue;
            }
            let Some(members) = per_topic.get(&topic.id) else {
                continue;
            };
            if members.len() <= self.classifier.min_topic_records {
                continue;
            }

            let samples: Vec<(SideId, i64)> = members
                .iter()
                .filter_map(|q| q.subtopic.as_ref().map(|s| (SideId::question(q.id), s.id)))
                .collect();
            let label = subtopic_label(topic.id);
            if let Err(e) = index.train_classifier(&label, &samples) {
                tracing::debug!("Skipping subtopic classifier for '{}': {}", topic.name, e);
            }
        }

        Ok(())
    }
}
