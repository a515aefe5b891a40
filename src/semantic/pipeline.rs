//! Query orchestration: validate, resolve index and embed, rank, paginate.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::LoadError;
use crate::semantic::pager::{paginate, PageRequest, PageResult};
use crate::semantic::ranker::{rank, RankError};
use crate::semantic::registry::IndexRegistry;

/// Every way a query can fail.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Corpus '{0}' not found")]
    NotFound(String),

    #[error("Corrupt index for corpus '{corpus}': {reason}")]
    CorruptIndex { corpus: String, reason: String },

    #[error("Dimension mismatch: index has {expected} dimensions, query vector has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(#[from] EmbeddingError),
}

impl From<LoadError> for QueryError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound(name) => QueryError::NotFound(name),
            LoadError::CorruptIndex { corpus, reason } => QueryError::CorruptIndex { corpus, reason },
        }
    }
}

impl From<RankError> for QueryError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::DimensionMismatch { expected, got } => {
                QueryError::DimensionMismatch { expected, got }
            }
        }
    }
}

/// The engine's single entry point.
///
/// Holds shared handles only, so one pipeline can serve any number of
/// concurrent requests.
pub struct QueryPipeline {
    registry: Arc<IndexRegistry>,
    embedder: Arc<dyn Embedder>,
}

impl QueryPipeline {
    pub fn new(registry: Arc<IndexRegistry>, embedder: Arc<dyn Embedder>) -> Self {
        Self { registry, embedder }
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Rank the request's corpus against its query text and return one page.
    ///
    /// Blank query text fails before the embedder or the registry are touched.
    /// The query is embedded on a scoped thread while the index is resolved on
    /// the calling thread; index loads must stay off the rayon pool. A load
    /// failure takes precedence over an embedding failure.
    pub fn query(&self, request: &PageRequest) -> Result<PageResult, QueryError> {
        if request.query_text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let started = Instant::now();

        let (index, embedding) = thread::scope(|s| {
            let embedding = s.spawn(|| self.embedder.embed(&request.query_text));
            let index = self.registry.get_or_load(&request.corpus);

            let embedding = embedding
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (index, embedding)
        });
        let index = index?;
        let embedding = embedding?;

        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::EmbeddingFailed(
                "query embedding contains non-finite values".to_string(),
            )
            .into());
        }

        let ranked = rank(&embedding, &index)?;
        let result = paginate(ranked, request.limit, request.page, request.per_page);

        log::debug!(
            "Query on '{}' page {}/{} ({} results) took {:?}",
            index.name(),
            result.page,
            result.total_pages,
            result.total_results,
            started.elapsed()
        );

        Ok(result)
    }
}
