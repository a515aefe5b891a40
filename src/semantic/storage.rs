//! Persisted index artifacts.
//!
//! Every corpus `<name>` owns three files:
//! - `<index_dir>/<name>.vectors.bin` - the embedding matrix
//! - `<index_dir>/<name>.meta.json` - build metadata
//! - the clean records CSV (one `critique` column), row i <-> matrix row i
//!
//! Matrix file format:
//!
//! Header (49 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u32 (little-endian)
//! - row_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Payload:
//! - row_count * dimensions f32 values (little-endian), row-major

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::semantic::vector::IndexMatrix;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + dimensions(4) + row_count(8) + checksum(4)
const HEADER_SIZE: usize = 49;

/// Name of the text column in records files.
pub const RECORDS_COLUMN: &str = "critique";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file was built with a different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl StorageError {
    /// True when the error means the file simply is not there.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            StorageError::Csv(e) => matches!(
                e.kind(),
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }
}

/// Paths of the artifacts produced by an index build.
#[derive(Debug, Clone)]
pub struct IndexArtifacts {
    pub vectors: PathBuf,
    pub meta: PathBuf,
}

impl IndexArtifacts {
    pub fn new(index_dir: &Path, corpus: &str) -> Self {
        Self {
            vectors: index_dir.join(format!("{corpus}.vectors.bin")),
            meta: index_dir.join(format!("{corpus}.meta.json")),
        }
    }

    /// Both the matrix and its metadata are present.
    pub fn exists(&self) -> bool {
        self.vectors.exists() && self.meta.exists()
    }
}

/// Build metadata stored next to the matrix file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Model name used to build the matrix
    pub model: String,
    /// Number of embedded records
    pub n_docs: usize,
    /// Records file the matrix was built from
    pub records: PathBuf,
    pub built_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, |writer| {
            writer.write_all(&json)?;
            Ok(())
        })
    }
}

/// Storage manager for an embedding matrix file.
pub struct MatrixStorage {
    path: PathBuf,
}

impl MatrixStorage {
    /// Create a new storage manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the matrix from storage.
    ///
    /// # Arguments
    /// * `expected_model_id` - SHA256 hash of the expected model name
    /// * `expected_dimensions` - Expected embedding dimensions
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<IndexMatrix, StorageError> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = Self::read_header(&mut reader)?;
        Self::validate_header(&header, expected_model_id, expected_dimensions)?;

        let dims = header.dimensions as usize;
        let rows = usize::try_from(header.row_count)
            .map_err(|_| StorageError::InvalidFormat("row count overflows usize".to_string()))?;

        // Check the payload size against the file before allocating anything
        let payload_len = rows
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| StorageError::InvalidFormat("matrix shape overflows".to_string()))?;
        let expected_len = (HEADER_SIZE + payload_len) as u64;
        if file_len != expected_len {
            return Err(StorageError::InvalidFormat(format!(
                "expected {} bytes for {} x {} matrix, file has {}",
                expected_len, rows, dims, file_len
            )));
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        IndexMatrix::from_flat(data, rows, dims)
            .map_err(|e| StorageError::InvalidFormat(e.to_string()))
    }

    /// Save the matrix to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&self, matrix: &IndexMatrix, model_id: &[u8; 32]) -> Result<(), StorageError> {
        let dimensions = u32::try_from(matrix.dims()).map_err(|_| {
            StorageError::InvalidFormat(format!("{} dimensions do not fit the header", matrix.dims()))
        })?;

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions,
            row_count: matrix.rows() as u64,
        };

        write_atomic(&self.path, |writer| {
            writer.write_all(&header.to_bytes())?;
            for &value in matrix.as_slice() {
                writer.write_all(&value.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Read header from file.
    fn read_header(reader: &mut impl Read) -> Result<Header, StorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StorageError::InvalidFormat("file shorter than header".to_string())
            } else {
                e.into()
            }
        })?;

        let version = header_bytes[0];

        // Version check first
        if version != FORMAT_VERSION {
            return Err(StorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let mut dims = [0u8; 4];
        dims.copy_from_slice(&header_bytes[33..37]);
        let mut rows = [0u8; 8];
        rows.copy_from_slice(&header_bytes[37..45]);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&header_bytes[45..49]);

        // Verify checksum (computed over header without checksum field)
        if u32::from_le_bytes(checksum) != crc32fast::hash(&header_bytes[0..45]) {
            return Err(StorageError::ChecksumMismatch);
        }

        Ok(Header {
            version,
            model_id,
            dimensions: u32::from_le_bytes(dims),
            row_count: u64::from_le_bytes(rows),
        })
    }

    /// Validate header against expected values.
    fn validate_header(
        header: &Header,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(), StorageError> {
        if header.model_id != *expected_model_id {
            return Err(StorageError::ModelMismatch);
        }

        if header.dimensions as usize != expected_dimensions {
            return Err(StorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        Ok(())
    }
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u32,
    row_count: u64,
}

impl Header {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[1..33].copy_from_slice(&self.model_id);
        bytes[33..37].copy_from_slice(&self.dimensions.to_le_bytes());
        bytes[37..45].copy_from_slice(&self.row_count.to_le_bytes());

        let checksum = crc32fast::hash(&bytes[0..45]);
        bytes[45..49].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }
}

/// Write through a temp file, fsync, then rename over `path`.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), StorageError>,
{
    let temp_path = path.with_extension("tmp");

    let result = write_synced(&temp_path, write);

    if result.is_err() {
        // Clean up temp file on error
        let _ = std::fs::remove_file(&temp_path);
        return result;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

fn write_synced<F>(path: &Path, write: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), StorageError>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Read the `critique` column of a records CSV, in file order.
pub fn read_records(path: &Path) -> Result<Vec<String>, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h == RECORDS_COLUMN)
        .ok_or_else(|| {
            StorageError::InvalidFormat(format!(
                "column '{}' not found in {}",
                RECORDS_COLUMN,
                path.display()
            ))
        })?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.get(column).unwrap_or_default().to_string());
    }

    Ok(records)
}

/// Write records as a single-column CSV.
pub fn write_records<I, S>(path: &Path, records: I) -> Result<usize, StorageError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([RECORDS_COLUMN])?;

    let mut count = 0;
    for record in records {
        writer.write_record([record.as_ref()])?;
        count += 1;
    }
    writer.flush()?;

    Ok(count)
}
