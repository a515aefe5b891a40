use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::DEFAULT_MODEL;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_INDEX_DIR: &str = "models";
const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_PER_PAGE: usize = 10;
const MAX_PER_PAGE: usize = 50;

/// Configuration for the embedding model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
        }
    }
}

/// Configuration for the HTTP server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Load every corpus at startup instead of on first query
    #[serde(default)]
    pub preload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            preload: false,
        }
    }
}

/// A searchable corpus
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Clean records CSV (single `critique` column)
    pub records: PathBuf,

    /// Display name, defaults to the corpus key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding built index artifacts
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    #[serde(default = "default_corpus")]
    pub default_corpus: String,

    #[serde(default = "default_per_page")]
    pub default_per_page: usize,

    #[serde(default = "max_per_page")]
    pub max_per_page: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_corpora")]
    pub corpora: BTreeMap<String, CorpusConfig>,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            default_corpus: default_corpus(),
            default_per_page: default_per_page(),
            max_per_page: max_per_page(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
            corpora: default_corpora(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INDEX_DIR)
}

fn default_corpus() -> String {
    "interstellar".to_string()
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

fn max_per_page() -> usize {
    MAX_PER_PAGE
}

fn default_corpora() -> BTreeMap<String, CorpusConfig> {
    BTreeMap::from([
        (
            "interstellar".to_string(),
            CorpusConfig {
                records: PathBuf::from("data/interstellar_clean.csv"),
                title: Some("Interstellar".to_string()),
            },
        ),
        (
            "fightclub".to_string(),
            CorpusConfig {
                records: PathBuf::from("data/fightclub_clean.csv"),
                title: Some("Fight Club".to_string()),
            },
        ),
    ])
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.corpora.is_empty() {
            bail!("at least one corpus must be configured");
        }

        for name in self.corpora.keys() {
            // corpus names become file names in index_dir
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                bail!("corpus name '{name}' may only contain letters, digits, '-' and '_'");
            }
        }

        if !self.corpora.contains_key(&self.default_corpus) {
            bail!(
                "default_corpus '{}' is not one of the configured corpora",
                self.default_corpus
            );
        }

        if self.max_per_page == 0 {
            bail!("max_per_page must be greater than 0");
        }

        if self.default_per_page == 0 || self.default_per_page > self.max_per_page {
            bail!(
                "default_per_page must be between 1 and {}, got {}",
                self.max_per_page,
                self.default_per_page
            );
        }

        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults on first run.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            log::info!("Writing default configuration to {}", config_path.display());
            let default = serde_yml::to_string(&Self::default())?;
            std::fs::write(&config_path, default)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", config_path.display()))?;

        config.base_path = base_path.to_path_buf();
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

        // resave in case config version needs an upgrade
        let upgraded = serde_yml::to_string(&config)?;
        if config_str != upgraded {
            std::fs::write(&config_path, upgraded)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
        }

        Ok(config)
    }

    /// Resolve a configured path against the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.index_dir)
    }

    /// Where downloaded embedding models are cached.
    pub fn models_cache_dir(&self) -> PathBuf {
        self.index_dir().join("cache")
    }

    /// Corpus name -> resolved records path.
    pub fn records_paths(&self) -> BTreeMap<String, PathBuf> {
        self.corpora
            .iter()
            .map(|(name, corpus)| (name.clone(), self.resolve(&corpus.records)))
            .collect()
    }

    pub fn corpus_title<'a>(&'a self, name: &'a str) -> &'a str {
        self.corpora
            .get(name)
            .and_then(|c| c.title.as_deref())
            .unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_per_page, 10);
        assert_eq!(config.max_per_page, 50);
        assert_eq!(config.corpus_title("fightclub"), "Fight Club");
        assert_eq!(config.corpus_title("unknown"), "unknown");
    }

    #[test]
    fn test_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_with(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.index_dir(), dir.path().join("models"));
        assert_eq!(
            config.records_paths().get("interstellar"),
            Some(&dir.path().join("data/interstellar_clean.csv"))
        );

        // loading twice gives the same result
        assert_eq!(Config::load_with(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "default_corpus: matrix\ncorpora:\n  matrix:\n    records: /srv/matrix_clean.csv\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();

        assert_eq!(config.corpora.len(), 1);
        assert_eq!(config.embedding.model, DEFAULT_MODEL);
        assert_eq!(
            config.records_paths().get("matrix"),
            Some(&PathBuf::from("/srv/matrix_clean.csv"))
        );

        // missing fields were written back
        let saved = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("max_per_page"));
    }

    #[test]
    fn test_default_corpus_must_exist() {
        let config = Config {
            default_corpus: "matrix".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_corpus_name_must_be_file_safe() {
        let mut config = Config::default();
        config.corpora.insert(
            "../etc".to_string(),
            CorpusConfig {
                records: PathBuf::from("x.csv"),
                title: None,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_page_bounds() {
        let config = Config {
            default_per_page: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
