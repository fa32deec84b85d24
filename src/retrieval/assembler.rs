//! Full-scan and similarity result assembly

use crate::error::{Result, SrpaError};
use crate::index::{IndexHandle, Seed};
use crate::records::{Question, SideId};
use crate::retrieval::deduplication::merge_hits;
use crate::retrieval::filter::{compile, Predicate};
use crate::retrieval::pagination::{paginate, SearchHit, SearchResultPage};
use crate::retrieval::query::{Basis, SearchQuery, SeedSource, SortOrder, Target};
use crate::storage::RecordStore;
use ahash::AHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// Seed after the referenced record, if any, has been loaded
enum ResolvedSeed {
    Side(SideId),
    Text(String),
}

impl ResolvedSeed {
    fn as_seed(&self) -> Seed<'_> {
        match self {
            ResolvedSeed::Side(side) => Seed::Side(*side),
            ResolvedSeed::Text(text) => Seed::Text(text),
        }
    }
}

/// Turns a [`SearchQuery`] into an ordered, filtered, paginated result
pub struct ResultAssembler {
    store: Arc<dyn RecordStore>,
    index: Arc<IndexHandle>,
    max_distance: f32,
}

impl ResultAssembler {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<IndexHandle>, max_distance: f32) -> Self {
        Self {
            store,
            index,
            max_distance,
        }
    }

    pub fn assemble(&self, query: &SearchQuery) -> Result<SearchResultPage> {
        let hits = self.ranked_hits(query)?;
        Ok(paginate(hits, query.page, query.per_page))
    }

    /// Every hit of the query in final order, before pagination
    pub fn ranked_hits(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let predicate = compile(&query.filters, self.store.as_ref());

        match &query.seed {
            None => self.full_scan(&predicate, &query.order),
            Some(seed) => self.similar(seed, query, &predicate),
        }
    }

    fn full_scan(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<SearchHit>> {
        if predicate.matches_nothing() {
            tracing::debug!("Filter matches nothing, skipping scan");
            return Ok(Vec::new());
        }

        let mut questions = self.store.filter_by_predicate(predicate)?;
        sort_questions(&mut questions, order);
        Ok(questions.into_iter().map(SearchHit::unscored).collect())
    }

    fn similar(
        &self,
        seed: &SeedSource,
        query: &SearchQuery,
        predicate: &Predicate,
    ) -> Result<Vec<SearchHit>> {
        let (resolved, exclude) = self.resolve_seed(seed, query.basis)?;

        if predicate.matches_nothing() {
            tracing::debug!("Filter matches nothing, skipping similarity search");
            return Ok(Vec::new());
        }

        let universe = self.universe(query.target)?;
        if universe.is_empty() {
            tracing::debug!("Empty candidate universe for {:?}", query.target);
            return Ok(Vec::new());
        }

        let Some(index) = self.index.snapshot() else {
            tracing::warn!("No similarity index installed, returning no hits");
            return Ok(Vec::new());
        };

        let k = query.per_page.min(universe.len());
        let raw = match index.nearest(&resolved.as_seed(), &universe, k, self.max_distance) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Similarity query failed: {}", e);
                return Ok(Vec::new());
            }
        };
        if raw.is_empty() {
            tracing::debug!(
                "No candidate within distance {} out of {}",
                self.max_distance,
                universe.len()
            );
        }

        let merged = merge_hits(raw, exclude);
        let ids: Vec<i64> = merged.iter().map(|h| h.record_id).collect();
        let mut records: AHashMap<i64, Question> = self
            .store
            .fetch_by_ids(&ids)?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        Ok(merged
            .into_iter()
            .filter_map(|hit| {
                let question = records.remove(&hit.record_id)?;
                predicate.matches(&question).then(|| SearchHit {
                    question,
                    distance: Some(hit.distance),
                    matched_terms: hit.matched_terms,
                })
            })
            .collect())
    }

    /// The seed in index terms, plus the record to leave out of the hits
    fn resolve_seed(&self, seed: &SeedSource, basis: Basis) -> Result<(ResolvedSeed, Option<i64>)> {
        match seed {
            SeedSource::Text(text) => Ok((ResolvedSeed::Text(text.clone()), None)),
            SeedSource::Record(id) => {
                let record = self.store.get(*id)?.ok_or(SrpaError::NotFound {
                    entity: "question",
                    id: *id,
                })?;
                let resolved = match basis {
                    Basis::Question => ResolvedSeed::Side(SideId::question(record.id)),
                    Basis::Answer => ResolvedSeed::Side(SideId::answer(record.id)),
                    Basis::Freeform => ResolvedSeed::Text(record.full_text()),
                };
                Ok((resolved, Some(record.id)))
            }
        }
    }

    /// Side ids of the target corpus that carry text
    fn universe(&self, target: Target) -> Result<Vec<SideId>> {
        let questions = self.store.all_questions()?;
        let mut sides = Vec::with_capacity(questions.len() * 2);
        for q in &questions {
            if target != Target::Answers && !q.question_text().is_empty() {
                sides.push(SideId::question(q.id));
            }
            if target != Target::Questions && !q.answer_text().is_empty() {
                sides.push(SideId::answer(q.id));
            }
        }
        Ok(sides)
    }
}

/// Full-scan ordering; stable, so ties keep natural order
fn sort_questions(questions: &mut [Question], order: &SortOrder) {
    let by_report = |a: &Question, b: &Question| {
        a.report
            .name
            .cmp(&b.report.name)
            .then(a.number.cmp(&b.number))
    };

    match order {
        SortOrder::Asc => questions.sort_by(by_report),
        SortOrder::Desc => questions.sort_by(|a, b| by_report(b, a)),
        SortOrder::DateAsc => {
            questions.sort_by(|a, b| dated_last(a, b, |x, y| x.cmp(y)));
        }
        SortOrder::DateDesc => {
            questions.sort_by(|a, b| dated_last(a, b, |x, y| y.cmp(x)));
        }
        SortOrder::Natural(_) => {}
    }
}

fn dated_last(
    a: &Question,
    b: &Question,
    cmp: impl Fn(&chrono::NaiveDate, &chrono::NaiveDate) -> Ordering,
) -> Ordering {
    match (&a.question_date, &b.question_date) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
