mod web;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::semantic::embeddings::EmbeddingError;
use crate::semantic::index::{CorpusIndex, IndexLoader, LoadError};
use crate::semantic::{Embedder, IndexMatrix, IndexRegistry, QueryPipeline};

/// Embedder with fixed vectors for known texts and a byte-derived vector for
/// everything else.
pub struct StubEmbedder {
    name: String,
    dims: usize,
    known: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl StubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            name: "stub-model".to_string(),
            dims,
            known: HashMap::new(),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: &[f32]) -> Self {
        assert_eq!(vector.len(), self.dims);
        self.known.insert(text.to_string(), vector.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next `embed` call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed("stub failure".to_string()));
        }

        if let Some(vector) = self.known.get(text) {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dims] += byte as f32;
        }
        Ok(vector)
    }
}

/// Loader serving corpora from memory, counting loads.
pub struct MemoryLoader {
    corpora: HashMap<String, (Vec<Vec<f32>>, Vec<String>)>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            corpora: HashMap::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_corpus(mut self, name: &str, rows: &[&[f32]], records: &[&str]) -> Self {
        self.corpora.insert(
            name.to_string(),
            (
                rows.iter().map(|r| r.to_vec()).collect(),
                records.iter().map(|r| r.to_string()).collect(),
            ),
        );
        self
    }

    /// Sleep while loading `name`.
    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IndexLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<CorpusIndex, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(name) {
            std::thread::sleep(*delay);
        }

        let (rows, records) = self
            .corpora
            .get(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        let matrix = IndexMatrix::from_rows(rows.clone()).map_err(|e| LoadError::CorruptIndex {
            corpus: name.to_string(),
            reason: e.to_string(),
        })?;

        CorpusIndex::new(name, matrix, records.clone())
    }
}

/// Three critiques scoring 0.9, 0.9 and 0.2 against the query "great".
pub fn sample_loader() -> MemoryLoader {
    let high = [0.9, 0.19f32.sqrt()];
    let low = [0.2, 0.96f32.sqrt()];

    MemoryLoader::new().with_corpus(
        "interstellar",
        &[&high, &high, &low],
        &["A stunning journey", "Stunning and moving", "Too long for me"],
    )
}

/// `sample_loader` plus a two-row `fightclub` corpus.
pub fn two_corpus_loader() -> MemoryLoader {
    sample_loader().with_corpus(
        "fightclub",
        &[&[1.0, 0.0], &[0.0, 1.0]],
        &["Rule number one", "Tyler was right"],
    )
}

pub fn sample_embedder() -> StubEmbedder {
    StubEmbedder::new(2).with_vector("great", &[1.0, 0.0])
}

pub fn pipeline(
    loader: Arc<MemoryLoader>,
    embedder: Arc<StubEmbedder>,
    corpora: &[&str],
) -> QueryPipeline {
    let registry = IndexRegistry::new(loader, corpora.iter().copied());
    QueryPipeline::new(Arc::new(registry), embedder)
}
