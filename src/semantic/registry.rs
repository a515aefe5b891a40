//! Process-wide cache of loaded corpus indices.
//!
//! Each registered corpus gets one [`OnceCell`] slot. The slot map lock is held
//! only to fetch or create a slot; the load itself runs inside
//! `OnceCell::get_or_init`, so callers racing for the same corpus wait on that
//! single load while other corpora stay unaffected. The outcome, success or
//! failure, stays in the slot until the process exits.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::semantic::index::{CorpusIndex, IndexLoader, LoadError};

type LoadOutcome = Result<Arc<CorpusIndex>, LoadError>;

pub struct IndexRegistry {
    loader: Arc<dyn IndexLoader>,
    corpora: BTreeSet<String>,
    slots: Mutex<HashMap<String, Arc<OnceCell<LoadOutcome>>>>,
}

impl IndexRegistry {
    /// Create a registry serving the given corpus names through `loader`.
    pub fn new<I, S>(loader: Arc<dyn IndexLoader>, corpora: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            loader,
            corpora: corpora.into_iter().map(Into::into).collect(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Registered corpus names, sorted.
    pub fn corpus_names(&self) -> impl Iterator<Item = &str> {
        self.corpora.iter().map(String::as_str)
    }

    /// Return the index for `name`, loading it on first use.
    ///
    /// At most one load ever runs per name. A failed load is remembered and
    /// returned to every later caller without touching the loader again.
    pub fn get_or_load(&self, name: &str) -> Result<Arc<CorpusIndex>, LoadError> {
        if !self.corpora.contains(name) {
            return Err(LoadError::NotFound(name.to_string()));
        }

        let slot = self.slot(name);

        slot.get_or_init(|| {
            log::debug!("Loading index for corpus '{}'", name);
            let outcome = self.loader.load(name).map(Arc::new);
            if let Err(e) = &outcome {
                log::warn!("Index for corpus '{}' unavailable: {}", name, e);
            }
            outcome
        })
        .clone()
    }

    /// Whether a load for `name` has completed successfully.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.lock_slots()
            .get(name)
            .and_then(|slot| slot.get())
            .is_some_and(|outcome| outcome.is_ok())
    }

    /// Load every registered corpus, returning the failures.
    pub fn preload_all(&self) -> Vec<LoadError> {
        self.corpora
            .iter()
            .filter_map(|name| self.get_or_load(name).err())
            .collect()
    }

    fn slot(&self, name: &str) -> Arc<OnceCell<LoadOutcome>> {
        self.lock_slots()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<LoadOutcome>>>> {
        // The map is insert-only, so a poisoned guard still holds consistent data
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::vector::IndexMatrix;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
    }

    impl IndexLoader for CountingLoader {
        fn load(&self, name: &str) -> Result<CorpusIndex, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LoadError::CorruptIndex {
                    corpus: name.to_string(),
                    reason: "broken".to_string(),
                });
            }
            let matrix = IndexMatrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
            CorpusIndex::new(name, matrix, vec!["only".to_string()])
        }
    }

    fn registry(fail: bool) -> (IndexRegistry, Arc<CountingLoader>) {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail,
        });
        let registry = IndexRegistry::new(loader.clone(), ["interstellar", "fightclub"]);
        (registry, loader)
    }

    #[test]
    fn test_loads_once_and_shares() {
        let (registry, loader) = registry(false);

        let first = registry.get_or_load("interstellar").unwrap();
        let second = registry.get_or_load("interstellar").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded("interstellar"));
        assert!(!registry.is_loaded("fightclub"));
    }

    #[test]
    fn test_unknown_corpus_is_not_found() {
        let (registry, loader) = registry(false);

        assert_eq!(
            registry.get_or_load("matrix").unwrap_err(),
            LoadError::NotFound("matrix".to_string())
        );
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
        assert!(registry.lock_slots().is_empty());
    }

    #[test]
    fn test_failure_is_sticky() {
        let (registry, loader) = registry(true);

        for _ in 0..5 {
            assert!(matches!(
                registry.get_or_load("fightclub"),
                Err(LoadError::CorruptIndex { .. })
            ));
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(!registry.is_loaded("fightclub"));
    }

    #[test]
    fn test_preload_all() {
        let (registry, loader) = registry(false);

        assert!(registry.preload_all().is_empty());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert!(registry.is_loaded("fightclub"));
        assert!(registry.is_loaded("interstellar"));
    }

    #[test]
    fn test_corpus_names_sorted() {
        let (registry, _) = registry(false);
        let names: Vec<&str> = registry.corpus_names().collect();
        assert_eq!(names, vec!["fightclub", "interstellar"]);
    }
}
