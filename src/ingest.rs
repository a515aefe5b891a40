//! Raw review export -> clean records CSV.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::semantic::preprocess::clean_text;
use crate::semantic::storage::write_records;

/// Column holding the review body in raw exports.
const REVIEW_COLUMN: &str = "review_content";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessReport {
    /// Rows read from the raw file
    pub read: usize,
    /// Rows written to the clean file
    pub kept: usize,
}

/// `<base>/data/<stem>_clean.csv` for an input named `<stem>.csv`.
pub fn default_output_path(base_path: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());

    base_path.join("data").join(format!("{stem}_clean.csv"))
}

/// Clean every review of `input` and write the survivors to `output`.
///
/// Rows whose review is empty, or only markup, are dropped; the rest keep
/// their relative order.
pub fn preprocess_file(input: &Path, output: &Path) -> anyhow::Result<PreprocessReport> {
    log::info!("Loading {}", input.display());

    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h == REVIEW_COLUMN)
        .ok_or_else(|| anyhow!("column '{}' not found in {}", REVIEW_COLUMN, input.display()))?;

    let mut read = 0;
    let mut cleaned = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("malformed row in {}", input.display()))?;
        read += 1;

        if let Some(text) = record.get(column).and_then(clean_text) {
            cleaned.push(text);
        }
    }

    let kept = write_records(output, &cleaned)
        .with_context(|| format!("failed to write {}", output.display()))?;

    log::info!(
        "Saved the cleaned CSV to {} ({} of {} rows kept)",
        output.display(),
        kept,
        read
    );

    Ok(PreprocessReport { read, kept })
}
