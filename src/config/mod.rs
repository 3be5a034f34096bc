//! Configuration management for jobmatch
//!
//! Loading, profile application, environment overrides and validation.
//! Every retrieval tunable (depth, fusion offset, modality gates) lives
//! here as a named value.

use crate::error::{JobMatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds `index/` and `results.sqlite`
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn index_dir(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.data_dir)?.join("index"))
    }

    pub fn results_db(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.data_dir)?.join("results.sqlite"))
    }
}

/// Dense encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "fastembed" or "hash"
    pub backend: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
}

/// Hybrid retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result depth per modality and of the fused list (N)
    pub depth: usize,
    /// Fusion rank offset (k)
    pub rrf_k: f64,
    pub bm25_enabled: bool,
    pub dense_enabled: bool,
    /// Conditions beyond this many are ignored
    #[serde(default = "default_max_conditions")]
    pub max_conditions: usize,
    /// Entry of the condition file to read per candidate
    #[serde(default = "default_query_type")]
    pub query_type: String,
}

fn default_max_conditions() -> usize {
    32
}

fn default_query_type() -> String {
    "conditions".to_string()
}

/// Tier band configuration: cumulative upper bounds on retrieval rank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub bounds: Vec<usize>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            bounds: vec![5, 15, 30],
        }
    }
}

/// LLM judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf_k: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(JobMatchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| JobMatchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| JobMatchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| JobMatchError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(depth) = overrides.depth {
            self.retrieval.depth = depth;
        }
        if let Some(rrf_k) = overrides.rrf_k {
            self.retrieval.rrf_k = rrf_k;
        }
        if let Some(enabled) = overrides.bm25_enabled {
            self.retrieval.bm25_enabled = enabled;
        }
        if let Some(enabled) = overrides.dense_enabled {
            self.retrieval.dense_enabled = enabled;
        }
        if let Some(backend) = overrides.embedding_backend {
            self.embedding.backend = backend;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: JOBMATCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("JOBMATCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
            value.parse().map_err(|_| JobMatchError::InvalidConfigValue {
                path: path.to_string(),
                message: format!("Cannot parse '{}'", value),
            })
        }

        match path {
            "RETRIEVAL__DEPTH" => self.retrieval.depth = parse(path, value)?,
            "RETRIEVAL__RRF_K" => self.retrieval.rrf_k = parse(path, value)?,
            "RETRIEVAL__BM25_ENABLED" => self.retrieval.bm25_enabled = parse(path, value)?,
            "RETRIEVAL__DENSE_ENABLED" => self.retrieval.dense_enabled = parse(path, value)?,
            "RETRIEVAL__QUERY_TYPE" => self.retrieval.query_type = value.to_string(),
            "EMBEDDING__BACKEND" => self.embedding.backend = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "LLM__ENABLED" => self.llm.enabled = parse(path, value)?,
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| JobMatchError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("jobmatch").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.jobmatch"),
            },
            embedding: EmbeddingConfig {
                backend: "fastembed".to_string(),
                model: "bge-base-en-v1.5".to_string(),
                dimension: 768,
                batch_size: 32,
            },
            retrieval: RetrievalConfig {
                depth: 2000,
                rrf_k: 20.0,
                bm25_enabled: true,
                dense_enabled: true,
                max_conditions: default_max_conditions(),
                query_type: default_query_type(),
            },
            tiers: TierConfig::default(),
            llm: LlmConfig {
                enabled: true,
                provider: "openai".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "gpt-4-turbo".to_string(),
                temperature: 0.0,
                timeout_secs: default_timeout_secs(),
            },
            profiles: HashMap::new(),
        }
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| JobMatchError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| JobMatchError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.llm.enabled = false;
        config.retrieval.depth = 50;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.depth, 50);
        assert_eq!(loaded.tiers.bounds, vec![5, 15, 30]);
    }

    #[test]
    fn test_missing_config() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(JobMatchError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "lexical".to_string(),
            ProfileOverrides {
                dense_enabled: Some(false),
                depth: Some(100),
                ..Default::default()
            },
        );

        config.apply_profile("lexical").unwrap();
        assert!(!config.retrieval.dense_enabled);
        assert!(config.retrieval.bm25_enabled);
        assert_eq!(config.retrieval.depth, 100);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("RETRIEVAL__RRF_K", "60").unwrap();
        config.set_value_from_env("RETRIEVAL__DENSE_ENABLED", "false").unwrap();
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert!(!config.retrieval.dense_enabled);

        assert!(config.set_value_from_env("RETRIEVAL__DEPTH", "many").is_err());
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/jm"),
        };
        assert_eq!(storage.index_dir().unwrap(), PathBuf::from("/tmp/jm/index"));
        assert_eq!(storage.results_db().unwrap(), PathBuf::from("/tmp/jm/results.sqlite"));
    }
}
