//! Search and ranking over question records
//!
//! Flat parameters are normalised into a [`SearchQuery`], filter clauses are
//! compiled into one conjunctive [`Predicate`], and the [`ResultAssembler`]
//! runs either a full scan or a similarity search before paginating.
//! [`Searcher`] is the facade the CLI talks to.

mod assembler;
mod deduplication;
mod filter;
mod pagination;
mod query;
mod searcher;
mod suggest;

pub use assembler::ResultAssembler;
pub use deduplication::{merge_hits, SimilarityHit};
pub use filter::{
    compile, Comparator, Condition, FilterClause, FilterField, FilterValue, Operand, Predicate,
};
pub use pagination::{paginate, Pagination, SearchHit, SearchResultPage};
pub use query::{Basis, QueryParams, SearchQuery, SeedSource, SortOrder, Target};
pub use searcher::{FilterOptions, Searcher};
pub use suggest::suggest_tags;
