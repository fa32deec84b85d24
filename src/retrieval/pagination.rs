//! Result pages

use crate::records::Question;
use serde::{Deserialize, Serialize};

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub question: Question,
    /// Similarity distance; `None` for full-scan results
    pub distance: Option<f32>,
    pub matched_terms: Vec<String>,
}

impl SearchHit {
    /// A full-scan hit: no distance, no matched terms
    pub fn unscored(question: Question) -> Self {
        Self {
            question,
            distance: None,
            matched_terms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub items: Vec<SearchHit>,
    pub pagination: Pagination,
}

/// Cut the 1-based `page` of size `per_page` out of the full ordered list
pub fn paginate(hits: Vec<SearchHit>, page: usize, per_page: usize) -> SearchResultPage {
    let per_page = per_page.max(1);
    let total_results = hits.len();
    let total_pages = total_results.div_ceil(per_page);
    let from = page.saturating_sub(1).saturating_mul(per_page);

    let items = hits.into_iter().skip(from).take(per_page).collect();

    SearchResultPage {
        items,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_results,
        },
    }
}
