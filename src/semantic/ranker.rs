//! Cosine ranking of a whole corpus against a query vector.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::semantic::index::CorpusIndex;
use crate::semantic::vector::{dot, l2_norm};

/// One scored corpus row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// Row in the corpus matrix; the join key back to the records
    pub row: usize,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
    pub text: Arc<str>,
}

/// Errors that can occur while ranking.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RankError {
    #[error("Dimension mismatch: index has {expected} dimensions, query has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Cosine similarity from precomputed norms; 0.0 if either norm is zero.
fn cosine_with_norms(a: &[f32], b: &[f32], norm_a: f32, norm_b: f32) -> f32 {
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    // adding +0.0 turns -0.0 into +0.0 so equal scores compare equal
    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0) + 0.0
}

/// Ordering used for every ranking: higher score first, then lower row.
pub fn ranking_order(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.row.cmp(&b.row))
}

/// Score every row of `index` against `query` and return all rows in ranking order.
pub fn rank(query: &[f32], index: &CorpusIndex) -> Result<Vec<RankedResult>, RankError> {
    if query.len() != index.dimensions() {
        return Err(RankError::DimensionMismatch {
            expected: index.dimensions(),
            got: query.len(),
        });
    }

    let query_norm = l2_norm(query);
    let matrix = index.matrix();

    let mut results: Vec<RankedResult> = (0..index.row_count())
        .into_par_iter()
        .map(|row| RankedResult {
            row,
            score: cosine_with_norms(query, matrix.row(row), query_norm, index.norm(row)),
            text: index.record(row).cloned().unwrap_or_else(|| Arc::from("")),
        })
        .collect();

    results.par_sort_unstable_by(ranking_order);

    Ok(results)
}
