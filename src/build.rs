//! Offline index construction: clean records -> matrix file + metadata.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};

use crate::semantic::storage::{read_records, IndexArtifacts, IndexMetadata, MatrixStorage};
use crate::semantic::{Embedder, IndexMatrix};

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub corpus: String,
    /// Clean records CSV to embed
    pub records: PathBuf,
    pub index_dir: PathBuf,
    pub batch_size: usize,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub artifacts: IndexArtifacts,
    pub rows: usize,
    pub dimensions: usize,
}

/// Corpus key for a clean records file: `data/fightclub_clean.csv` -> `fightclub`.
pub fn corpus_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.strip_suffix("_clean").unwrap_or(stem);

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Embed every record of `opts.records` and persist the index artifacts.
pub fn build_index(embedder: &dyn Embedder, opts: &BuildOptions) -> anyhow::Result<BuildReport> {
    let records = read_records(&opts.records)
        .with_context(|| format!("failed to read records from {}", opts.records.display()))?;
    if records.is_empty() {
        bail!("{} contains no records", opts.records.display());
    }

    log::info!(
        "Encoding {} records of corpus '{}' with '{}'",
        records.len(),
        opts.corpus,
        embedder.model_name()
    );

    let progress = if opts.show_progress {
        let bar = ProgressBar::new(records.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ({eta})")?
                .progress_chars("##-"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut embeddings = Vec::with_capacity(records.len());
    for batch in records.chunks(opts.batch_size.max(1)) {
        let batch_embeddings = embedder
            .embed_batch(batch)
            .with_context(|| format!("failed to embed records of corpus '{}'", opts.corpus))?;

        if batch_embeddings.len() != batch.len() {
            bail!(
                "embedder returned {} vectors for {} records",
                batch_embeddings.len(),
                batch.len()
            );
        }

        embeddings.extend(batch_embeddings);
        progress.inc(batch.len() as u64);
    }
    progress.finish_and_clear();

    let matrix = IndexMatrix::from_rows(embeddings)?;
    if matrix.dims() != embedder.dimensions() {
        bail!(
            "embedder declares {} dimensions but produced {}",
            embedder.dimensions(),
            matrix.dims()
        );
    }

    std::fs::create_dir_all(&opts.index_dir)
        .with_context(|| format!("failed to create {}", opts.index_dir.display()))?;
    let artifacts = IndexArtifacts::new(&opts.index_dir, &opts.corpus);

    log::info!("Saving embeddings in {}", artifacts.vectors.display());
    MatrixStorage::new(artifacts.vectors.clone()).save(&matrix, &embedder.model_id())?;

    log::info!("Saving metadata in {}", artifacts.meta.display());
    IndexMetadata {
        model: embedder.model_name().to_string(),
        n_docs: matrix.rows(),
        records: opts.records.clone(),
        built_at: Utc::now(),
    }
    .save(&artifacts.meta)?;

    Ok(BuildReport {
        artifacts,
        rows: matrix.rows(),
        dimensions: matrix.dims(),
    })
}
