//! srpa - parliamentary question registry with search and ranking
//!
//! Stores question/answer records tagged by report, author, answer author,
//! topic and subtopic; searches them by structured filters or by TF-IDF text
//! similarity, and suggests tags from classifiers trained on the corpus.

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod records;
pub mod retrieval;
pub mod storage;

pub use error::{Result, SrpaError};
