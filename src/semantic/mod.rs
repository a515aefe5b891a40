//! Similarity retrieval and ranking engine.
//!
//! Answers "which records of corpus X are most similar to this text" against
//! precomputed embedding matrices.
//!
//! # Architecture
//!
//! - `vector`: Dense embedding vector and matrix types
//! - `embeddings`: `Embedder` trait and the fastembed-backed model
//! - `storage`: Binary matrix files, build metadata and records CSV I/O
//! - `index`: Immutable `CorpusIndex` and the artifact loader
//! - `registry`: Lazily loads each corpus index at most once
//! - `ranker`: Cosine scoring with a deterministic total order
//! - `pager`: Result capping and pagination
//! - `pipeline`: `QueryPipeline`, the single query entry point
//! - `preprocess`: Text cleaning for records and snippets for display

pub mod embeddings;
pub mod index;
mod pager;
mod pipeline;
pub mod preprocess;
mod ranker;
mod registry;
pub mod storage;
mod vector;

pub use embeddings::{Embedder, EmbeddingModel};
pub use index::ArtifactLoader;
pub use pager::{PageRequest, PageResult};
pub use pipeline::{QueryError, QueryPipeline};
pub use ranker::RankedResult;
pub use registry::IndexRegistry;
pub use vector::IndexMatrix;

/// Default embedding model (multilingual, the reviews are mostly French)
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";
