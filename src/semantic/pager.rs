//! Result capping and pagination.
//!
//! `limit` caps the candidate pool before paging: it decides how many of the
//! globally best results exist at all, and so also `total_results`.

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::semantic::ranker::RankedResult;

/// A query against one corpus, already validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub corpus: String,
    pub query_text: String,
    /// 1-based page number
    pub page: NonZeroUsize,
    pub per_page: NonZeroUsize,
    /// Cap on the total number of results, applied before paging
    pub limit: Option<NonZeroUsize>,
}

impl PageRequest {
    /// First page of `per_page` results with no cap.
    pub fn new(corpus: impl Into<String>, query_text: impl Into<String>, per_page: NonZeroUsize) -> Self {
        Self {
            corpus: corpus.into(),
            query_text: query_text.into(),
            page: NonZeroUsize::MIN,
            per_page,
            limit: None,
        }
    }

    pub fn with_page(mut self, page: NonZeroUsize) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of a ranking plus what a caller needs to build navigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub items: Vec<RankedResult>,
    /// Results after `limit` was applied
    pub total_results: usize,
    pub total_pages: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Cap `ranked` to `limit`, then cut out page `page` of size `per_page`.
///
/// `ranked` must already be in ranking order. A page past the end yields no
/// items rather than an error.
pub fn paginate(
    mut ranked: Vec<RankedResult>,
    limit: Option<NonZeroUsize>,
    page: NonZeroUsize,
    per_page: NonZeroUsize,
) -> PageResult {
    if let Some(limit) = limit {
        ranked.truncate(limit.get());
    }

    let total_results = ranked.len();
    let total_pages = total_results.div_ceil(per_page.get());
    let start = (page.get() - 1).saturating_mul(per_page.get());

    let items = ranked
        .into_iter()
        .skip(start)
        .take(per_page.get())
        .collect();

    PageResult {
        items,
        total_results,
        total_pages,
        page: page.get(),
        per_page: per_page.get(),
    }
}
