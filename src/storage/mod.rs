//! Storage layer for srpa
//!
//! [`RecordStore`] is the contract the search pipeline and the index
//! refresher consume; [`SqliteStore`] implements it over [`Database`].

pub mod database;
mod store;

use crate::error::Result;
use crate::records::{Category, CategoryKind, NewQuestion, Question};
use crate::retrieval::Predicate;

pub use database::{Database, DbPool, DbStats};
pub use store::SqliteStore;

/// Question records and their category entities
pub trait RecordStore: Send + Sync {
    /// Records matching `predicate`, in natural (id) order
    fn filter_by_predicate(&self, predicate: &Predicate) -> Result<Vec<Question>>;

    /// Records with the given ids; missing ids are skipped, order follows
    /// the store
    fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>>;

    /// Id of the category of `kind` named `name` (already normalised)
    fn resolve_category_id(&self, kind: CategoryKind, name: &str) -> Result<Option<i64>>;

    /// All categories of `kind`, by name
    fn all_of(&self, kind: CategoryKind) -> Result<Vec<Category>>;

    /// Categories of `kind` referenced by at least one question, by name
    fn in_use(&self, kind: CategoryKind) -> Result<Vec<Category>>;

    /// Subtopics associated with a topic, by name
    fn subtopics_of(&self, topic_id: i64) -> Result<Vec<Category>>;

    fn get(&self, id: i64) -> Result<Option<Question>>;

    /// Insert a validated, normalised question and return its id
    fn insert(&self, question: &NewQuestion) -> Result<i64>;

    /// Replace every field of an existing question
    fn update(&self, id: i64, question: &NewQuestion) -> Result<()>;

    /// Assign topic and subtopic by name. `None` leaves a tag as it is, an
    /// empty name clears it.
    fn retag(&self, id: i64, topic: Option<&str>, subtopic: Option<&str>) -> Result<()>;

    /// Delete the given records, returning how many existed
    fn delete_many(&self, ids: &[i64]) -> Result<usize>;

    fn all_questions(&self) -> Result<Vec<Question>> {
        self.filter_by_predicate(&Predicate::always())
    }
}
