/// Configuration module for coderag.
///
/// Handles loading, validating, and providing default configuration values.
/// Secrets are never stored here: only the names of the environment
/// variables that hold them.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::chunker::{ChunkerConfig, DEFAULT_COMMENT_LOOKBACK, DEFAULT_MAX_CHUNK_LINES};
use crate::indexer::core::IndexerConfig;
use crate::indexer::scan::default_excludes;
use crate::query::tuner::RetrievalTable;

pub const DEFAULT_CONFIG_FILE: &str = "coderag.json";

/// Embedding providers understood by [`Config::validate`].
pub const PROVIDERS: [&str; 2] = ["hash", "openai"];

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./coderag.db".to_string()
}

fn default_max_chunk_lines() -> usize {
    DEFAULT_MAX_CHUNK_LINES
}

fn default_comment_lookback() -> usize {
    DEFAULT_COMMENT_LOOKBACK
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_provider() -> String {
    "hash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_max_chunk_lines")]
    pub max_chunk_lines: usize,

    /// Comment/annotation lines a declaration may pull in above itself.
    #[serde(default = "default_comment_lookback")]
    pub comment_lookback: usize,

    /// Files larger than this are skipped as unreadable; 0 disables the check.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub retrieval: RetrievalTable,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// File this configuration was loaded from, or will be saved to.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// `hash` (offline) or `openai` (any OpenAI-compatible endpoint).
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// Unset means answers are extractive and no model is called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_chunk_lines: default_max_chunk_lines(),
            comment_lookback: default_comment_lookback(),
            max_file_bytes: default_max_file_bytes(),
            exclude: default_excludes(),
            retrieval: RetrievalTable::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            source: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_FILE`], and a
    /// template is written there when it does not exist yet. Any other
    /// missing path, or invalid JSON, yields the defaults.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_FILE
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self {
                source: Some(PathBuf::from(path)),
                ..Self::default()
            };

            if path == DEFAULT_CONFIG_FILE {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self {
                    source: Some(PathBuf::from(path)),
                    ..Self::default()
                });
            }
        };

        info!("Loaded configuration from {path}");
        Ok(Self {
            source: Some(PathBuf::from(path)),
            ..cfg
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_chunk_lines > 0,
            "max_chunk_lines must be positive"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            PROVIDERS.contains(&self.embedding.provider.as_str()),
            "unknown embedding.provider {:?} (expected one of {})",
            self.embedding.provider,
            PROVIDERS.join(", ")
        );
        for (intent, spec) in self.retrieval.entries() {
            anyhow::ensure!(spec.k > 0, "retrieval.{intent}.k must be positive");
        }
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.llm.temperature),
            "llm.temperature must be within 0.0..=2.0"
        );
        Ok(())
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_lines: self.max_chunk_lines,
            comment_lookback: self.comment_lookback,
        }
    }

    /// The store with its SQLite side files, then the config file.
    #[must_use]
    pub fn own_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = ["", "-journal", "-wal", "-shm"]
            .iter()
            .map(|suffix| PathBuf::from(format!("{}{suffix}", self.db_path)))
            .collect();
        files.extend(self.source.clone());
        files
    }

    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunker: self.chunker_config(),
            exclude: self.exclude.clone(),
            max_file_bytes: self.max_file_bytes,
            skip_files: self.own_files(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::intent::Intent;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path, "./coderag.db");
        assert_eq!(config.max_chunk_lines, 80);
        assert_eq!(config.comment_lookback, 5);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dimensions, 384);
        assert!(config.llm.endpoint.is_none());
        assert!(config.exclude.contains(&"node_modules".to_string()));
        assert_eq!(config.retrieval.get(Intent::File).k, 3);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"max_chunk_lines": 40, "db_path": "./test.db", "retrieval": {"how": {"k": 9}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_chunk_lines, 40);
        assert_eq!(config.db_path, "./test.db");
        assert_eq!(config.retrieval.get(Intent::How).k, 9);
        assert_eq!(config.retrieval.get(Intent::Why).k, 6);
        assert_eq!(config.embedding.dimensions, 384);
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_values() {
        let mut config = Config::default();
        config.max_chunk_lines = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retrieval.explain.k = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retrieval.explain.k"));
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let config = Config::load(missing.to_str().unwrap()).unwrap();
        assert_eq!(config.max_chunk_lines, 80);
        assert!(!missing.exists());

        let invalid = dir.path().join("bad.json");
        std::fs::write(&invalid, "{ not json").unwrap();
        let config = Config::load(invalid.to_str().unwrap()).unwrap();
        assert_eq!(config.db_path, "./coderag.db");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coderag.json");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.comment_lookback = 2;
        config.llm.endpoint = Some("http://localhost:11434/v1".to_string());
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded.comment_lookback, 2);
        assert_eq!(loaded.llm.endpoint.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(loaded.retrieval, config.retrieval);
    }

    #[test]
    fn test_derived_configs() {
        let mut config = Config::default();
        config.max_chunk_lines = 30;
        config.max_file_bytes = 0;
        let indexer = config.indexer_config();
        assert_eq!(indexer.chunker.max_chunk_lines, 30);
        assert_eq!(indexer.chunker.comment_lookback, 5);
        assert_eq!(indexer.max_file_bytes, 0);
        assert_eq!(indexer.exclude, config.exclude);
    }

    #[test]
    fn test_own_files_cover_store_and_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"db_path": "./data/index.db"}"#).unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.indexer_config().skip_files,
            vec![
                PathBuf::from("./data/index.db"),
                PathBuf::from("./data/index.db-journal"),
                PathBuf::from("./data/index.db-wal"),
                PathBuf::from("./data/index.db-shm"),
                path.clone(),
            ]
        );
        assert!(!serde_json::to_string(&config).unwrap().contains("source"));
    }
}
