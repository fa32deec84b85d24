//! Boundary operations over the record store and the similarity index

use crate::config::Config;
use crate::error::{Result, SrpaError};
use crate::index::{IndexHandle, IndexRefresher, RefreshOutcome};
use crate::records::{
    normalize_name, CategoryKind, NewQuestion, Question, TagDimension, MAX_NAME_LENGTH,
};
use crate::retrieval::assembler::ResultAssembler;
use crate::retrieval::pagination::SearchResultPage;
use crate::retrieval::query::{QueryParams, SearchQuery, SeedSource};
use crate::retrieval::suggest::suggest_tags;
use crate::storage::{RecordStore, SqliteStore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Category names in use, per filter key
pub type FilterOptions = BTreeMap<&'static str, Vec<String>>;

const FILTER_OPTION_KEYS: &[(&str, CategoryKind)] = &[
    ("autor", CategoryKind::Author),
    ("informe", CategoryKind::Report),
    ("area", CategoryKind::Subtopic),
    ("ministerio", CategoryKind::Topic),
];

/// Search, tag suggestion and record operations.
///
/// Every mutation rebuilds the similarity index before returning.
pub struct Searcher {
    store: Arc<dyn RecordStore>,
    index: Arc<IndexHandle>,
    assembler: ResultAssembler,
    refresher: IndexRefresher,
    default_per_page: usize,
}

impl Searcher {
    /// Searcher over `store` with no index installed yet
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let index = Arc::new(IndexHandle::new());
        let assembler =
            ResultAssembler::new(store.clone(), index.clone(), config.search.max_distance);
        let refresher = IndexRefresher::new(
            index.clone(),
            config.classifier.clone(),
            config.search.max_matched_terms,
        );

        Self {
            store,
            index,
            assembler,
            refresher,
            default_per_page: config.search.per_page,
        }
    }

    /// Open the configured SQLite store and build the initial index
    pub fn open(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path()?)?;
        let searcher = Self::new(Arc::new(store), config);
        searcher.refresh_index();
        Ok(searcher)
    }

    pub fn index_handle(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn parse_query(&self, params: &QueryParams) -> Result<SearchQuery> {
        SearchQuery::from_params(params, self.default_per_page)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchResultPage> {
        tracing::debug!("Search: {:?}", query);
        self.assembler.assemble(query)
    }

    pub fn search_params(&self, params: &QueryParams) -> Result<SearchResultPage> {
        let query = self.parse_query(params)?;
        self.search(&query)
    }

    /// Delete every record the query matches, ignoring pagination
    pub fn delete_by_query(&self, params: &QueryParams) -> Result<bool> {
        let query = self.parse_query(params)?;
        let ids: Vec<i64> = self
            .assembler
            .ranked_hits(&query)?
            .iter()
            .map(|hit| hit.question.id)
            .collect();

        let deleted = self.store.delete_many(&ids)?;
        tracing::info!("Deleted {} questions matching query", deleted);
        self.refresh_index();
        Ok(true)
    }

    pub fn get_question(&self, id: i64) -> Result<Question> {
        self.store.get(id)?.ok_or(SrpaError::NotFound {
            entity: "question",
            id,
        })
    }

    /// Similarity search seeded by record `id`; other parameters apply as usual
    pub fn similar_to(&self, id: i64, params: &QueryParams) -> Result<SearchResultPage> {
        let mut query = self.parse_query(params)?;
        query.seed = Some(SeedSource::Record(id));
        self.search(&query)
    }

    pub fn suggest_tags(&self, dimension: TagDimension, id: i64) -> Result<Vec<String>> {
        let snapshot = self.index.snapshot();
        suggest_tags(self.store.as_ref(), snapshot.as_deref(), dimension, id)
    }

    pub fn create_question(&self, question: &NewQuestion) -> Result<i64> {
        let question = question.normalized();
        question.validate()?;
        let id = self.store.insert(&question)?;
        tracing::info!("Created question {} ({} #{})", id, question.report, question.number);
        self.refresh_index();
        Ok(id)
    }

    pub fn edit_question(&self, id: i64, question: &NewQuestion) -> Result<()> {
        let question = question.normalized();
        question.validate()?;
        self.store.update(id, &question)?;
        tracing::info!("Edited question {}", id);
        self.refresh_index();
        Ok(())
    }

    /// Set topic and/or subtopic; an empty name clears the tag
    pub fn retag_question(
        &self,
        id: i64,
        topic: Option<&str>,
        subtopic: Option<&str>,
    ) -> Result<()> {
        let topic = topic.map(normalize_name);
        let subtopic = subtopic.map(normalize_name);
        for (key, name) in [("topic", &topic), ("subtopic", &subtopic)] {
            if name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_LENGTH) {
                return Err(SrpaError::validation(
                    key,
                    format!("name longer than {} characters", MAX_NAME_LENGTH),
                ));
            }
        }

        self.store.retag(id, topic.as_deref(), subtopic.as_deref())?;
        tracing::info!("Retagged question {}", id);
        self.refresh_index();
        Ok(())
    }

    pub fn delete_question(&self, id: i64) -> Result<()> {
        if self.store.delete_many(&[id])? == 0 {
            return Err(SrpaError::NotFound {
                entity: "question",
                id,
            });
        }
        tracing::info!("Deleted question {}", id);
        self.refresh_index();
        Ok(())
    }

    pub fn list_filter_options(&self) -> Result<FilterOptions> {
        let mut options = FilterOptions::new();
        for (key, kind) in FILTER_OPTION_KEYS {
            let names = self
                .store
                .in_use(*kind)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            options.insert(*key, names);
        }
        Ok(options)
    }

    pub fn refresh_index(&self) -> RefreshOutcome {
        self.refresher.refresh(self.store.as_ref())
    }
}
