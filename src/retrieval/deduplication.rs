//! Collapse side-level similarity hits into one hit per record

use crate::index::RawHit;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A similarity hit for a whole record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub record_id: i64,
    pub distance: f32,
    pub matched_terms: Vec<String>,
}

/// Merge raw hits by record id, keeping the minimum distance and the union
/// of matched terms in first-seen order, then sort by (distance, record id).
///
/// Hits of `exclude` (the seed record) are dropped.
pub fn merge_hits(raw: Vec<RawHit>, exclude: Option<i64>) -> Vec<SimilarityHit> {
    let merged = raw
        .into_iter()
        .filter(|hit| Some(hit.side.record) != exclude)
        .fold(AHashMap::<i64, SimilarityHit>::new(), |mut acc, hit| {
            acc.entry(hit.side.record)
                .and_modify(|existing| {
                    existing.distance = existing.distance.min(hit.distance);
                    for term in &hit.matched_terms {
                        if !existing.matched_terms.contains(term) {
                            existing.matched_terms.push(term.clone());
                        }
                    }
                })
                .or_insert_with(|| SimilarityHit {
                    record_id: hit.side.record,
                    distance: hit.distance,
                    matched_terms: dedup_terms(&hit.matched_terms),
                });
            acc
        });

    let mut hits: Vec<SimilarityHit> = merged.into_values().collect();
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.record_id.cmp(&b.record_id))
    });
    hits
}

fn dedup_terms(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        if !out.contains(term) {
            out.push(term.clone());
        }
    }
    out
}
