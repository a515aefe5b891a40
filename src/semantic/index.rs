//! Immutable per-corpus index.
//!
//! A [`CorpusIndex`] pairs the embedding matrix with the records it was built
//! from. Row `i` of the matrix is the embedding of `records[i]`; that lockstep
//! is checked once in [`CorpusIndex::new`] and never changes afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::semantic::embeddings::model_id_hash;
use crate::semantic::storage::{read_records, IndexArtifacts, IndexMetadata, MatrixStorage, StorageError};
use crate::semantic::vector::{l2_norm, IndexMatrix};

/// Errors that can occur while materializing a corpus index.
///
/// Cloneable so a failed load can be handed to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Corpus '{0}' not found")]
    NotFound(String),

    #[error("Corrupt index for corpus '{corpus}': {reason}")]
    CorruptIndex { corpus: String, reason: String },
}

impl LoadError {
    fn corrupt(corpus: &str, reason: impl Into<String>) -> Self {
        LoadError::CorruptIndex {
            corpus: corpus.to_string(),
            reason: reason.into(),
        }
    }
}

/// A loaded corpus: matrix, records and cached row norms.
#[derive(Debug)]
pub struct CorpusIndex {
    name: String,
    matrix: IndexMatrix,
    records: Vec<Arc<str>>,
    norms: Vec<f32>,
}

impl CorpusIndex {
    /// Assemble an index, enforcing the row/record lockstep.
    ///
    /// Fails with `CorruptIndex` when the matrix is empty, when its row count
    /// differs from the number of records, or when it holds non-finite values.
    pub fn new(
        name: impl Into<String>,
        matrix: IndexMatrix,
        records: Vec<String>,
    ) -> Result<Self, LoadError> {
        let name = name.into();

        if matrix.is_empty() {
            return Err(LoadError::corrupt(&name, "matrix is empty"));
        }

        if matrix.rows() != records.len() {
            return Err(LoadError::corrupt(
                &name,
                format!(
                    "matrix has {} rows but there are {} records",
                    matrix.rows(),
                    records.len()
                ),
            ));
        }

        if let Some(pos) = matrix.as_slice().iter().position(|v| !v.is_finite()) {
            return Err(LoadError::corrupt(
                &name,
                format!("non-finite value in row {}", pos / matrix.dims()),
            ));
        }

        let norms = matrix.iter_rows().map(l2_norm).collect();
        let records = records.into_iter().map(Arc::from).collect();

        Ok(Self {
            name,
            matrix,
            records,
            norms,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Embedding dimensions (matrix column count).
    pub fn dimensions(&self) -> usize {
        self.matrix.dims()
    }

    pub fn matrix(&self) -> &IndexMatrix {
        &self.matrix
    }

    /// Source text of row `row`.
    pub fn record(&self, row: usize) -> Option<&Arc<str>> {
        self.records.get(row)
    }

    /// L2 norm of row `row`, computed at construction.
    pub fn norm(&self, row: usize) -> f32 {
        self.norms[row]
    }
}

/// Something that can materialize a corpus index by name.
pub trait IndexLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<CorpusIndex, LoadError>;
}

/// Loads indices from the artifacts written by an index build.
pub struct ArtifactLoader {
    index_dir: PathBuf,
    /// Corpus name -> records CSV
    corpora: BTreeMap<String, PathBuf>,
    model_name: String,
    dimensions: usize,
}

impl ArtifactLoader {
    /// # Arguments
    /// * `index_dir` - Directory holding `<name>.vectors.bin` and `<name>.meta.json`
    /// * `corpora` - Registered corpus names and their records files
    /// * `model_name` - Model the query embedder runs; matrices must match it
    /// * `dimensions` - Output dimensions of that model
    pub fn new(
        index_dir: PathBuf,
        corpora: BTreeMap<String, PathBuf>,
        model_name: &str,
        dimensions: usize,
    ) -> Self {
        Self {
            index_dir,
            corpora,
            model_name: model_name.to_string(),
            dimensions,
        }
    }

    fn storage_error(&self, name: &str, what: &str, err: StorageError) -> LoadError {
        if err.is_not_found() {
            LoadError::NotFound(name.to_string())
        } else {
            LoadError::corrupt(name, format!("{what}: {err}"))
        }
    }
}

impl IndexLoader for ArtifactLoader {
    fn load(&self, name: &str) -> Result<CorpusIndex, LoadError> {
        let records_path = self
            .corpora
            .get(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        let artifacts = IndexArtifacts::new(&self.index_dir, name);
        if !artifacts.exists() {
            log::warn!(
                "No index artifacts for corpus '{}' in {}, run `critiques build --corpus {}`",
                name,
                self.index_dir.display(),
                name
            );
            return Err(LoadError::NotFound(name.to_string()));
        }

        let started = Instant::now();

        let meta = IndexMetadata::load(&artifacts.meta)
            .map_err(|e| self.storage_error(name, "metadata", e))?;
        if meta.model != self.model_name {
            return Err(LoadError::corrupt(
                name,
                format!(
                    "index was built with model '{}', embedder runs '{}'",
                    meta.model, self.model_name
                ),
            ));
        }

        let matrix = MatrixStorage::new(artifacts.vectors)
            .load(&model_id_hash(&self.model_name), self.dimensions)
            .map_err(|e| self.storage_error(name, "matrix", e))?;
        if meta.n_docs != matrix.rows() {
            return Err(LoadError::corrupt(
                name,
                format!(
                    "metadata records {} documents, matrix has {} rows",
                    meta.n_docs,
                    matrix.rows()
                ),
            ));
        }

        let records =
            read_records(records_path).map_err(|e| self.storage_error(name, "records", e))?;

        let index = CorpusIndex::new(name, matrix, records)?;

        log::info!(
            "Loaded corpus '{}' ({} records, {} dimensions) in {:?}",
            name,
            index.row_count(),
            index.dimensions(),
            started.elapsed()
        );

        Ok(index)
    }
}
