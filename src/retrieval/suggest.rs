//! Ranked topic/subtopic suggestions for a record

use crate::error::{Result, SrpaError};
use crate::index::{subtopic_label, SimilarityIndex, TOPIC_LABEL};
use crate::records::{Category, CategoryKind, SideId, TagDimension};
use crate::storage::RecordStore;
use ahash::AHashMap;

/// Candidate tag names for `record_id`, best first.
///
/// A trained classifier ranks by score (ties by name); without one, or when
/// classification fails, the next tier lists names alphabetically.
pub fn suggest_tags(
    store: &dyn RecordStore,
    index: Option<&dyn SimilarityIndex>,
    dimension: TagDimension,
    record_id: i64,
) -> Result<Vec<String>> {
    let record = store.get(record_id)?.ok_or(SrpaError::NotFound {
        entity: "question",
        id: record_id,
    })?;
    let side = SideId::question(record.id);

    match dimension {
        TagDimension::Topic => {
            if let Some(ranked) = classified(store, index, TOPIC_LABEL, side, CategoryKind::Topic)? {
                return Ok(ranked);
            }
            Ok(names(store.all_of(CategoryKind::Topic)?))
        }
        TagDimension::Subtopic => {
            let Some(topic) = record.topic else {
                return Ok(names(store.all_of(CategoryKind::Subtopic)?));
            };
            let label = subtopic_label(topic.id);
            if let Some(ranked) = classified(store, index, &label, side, CategoryKind::Subtopic)? {
                return Ok(ranked);
            }
            Ok(names(store.subtopics_of(topic.id)?))
        }
    }
}

/// Names ranked by classifier `label`, or `None` to fall through
fn classified(
    store: &dyn RecordStore,
    index: Option<&dyn SimilarityIndex>,
    label: &str,
    side: SideId,
    kind: CategoryKind,
) -> Result<Option<Vec<String>>> {
    let Some(index) = index.filter(|i| i.has_classifier(label)) else {
        return Ok(None);
    };

    let scores = match index.classify(label, side) {
        Ok(scores) => scores,
        Err(e) => {
            tracing::warn!("Classifier '{}' failed for {}: {}", label, side, e);
            return Ok(None);
        }
    };

    let by_id: AHashMap<i64, String> = store
        .all_of(kind)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let mut ranked: Vec<(f32, String)> = scores
        .into_iter()
        .filter_map(|(id, score)| by_id.get(&id).map(|name| (score, name.clone())))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    Ok(Some(ranked.into_iter().map(|(_, name)| name).collect()))
}

fn names(categories: Vec<Category>) -> Vec<String> {
    categories.into_iter().map(|c| c.name).collect()
}
