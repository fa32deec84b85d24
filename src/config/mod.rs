//! Configuration management for srpa
//!
//! Loads the TOML configuration, applies `SRPA_SECTION__KEY` environment
//! overrides and validates the result before anything else touches it.

use crate::error::{Result, SrpaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
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
    pub data_dir: PathBuf,
}

/// Search and ranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the query does not ask for one
    pub per_page: usize,
    /// Similarity candidates farther than this are dropped by the index
    pub max_distance: f32,
    /// Upper bound on matched terms reported per similarity hit
    pub max_matched_terms: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            max_distance: 1.1,
            max_matched_terms: 10,
        }
    }
}

/// Auxiliary label classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// A topic gets a subtopic classifier only with more records than this
    pub min_topic_records: usize,
    /// Topics with shorter names never get a subtopic classifier
    pub min_topic_name_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_topic_records: 2,
            min_topic_name_len: 2,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SrpaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SrpaError::Io {
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
        std::fs::write(path, content).map_err(|e| SrpaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Defaults plus environment overrides, for when no config file exists
    pub fn from_env() -> Result<Self> {
        Self::defaults_with_overrides(std::env::vars())
    }

    fn defaults_with_overrides<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();
        config.apply_overrides(vars);

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SRPA_SECTION__KEY=value
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("SRPA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "SEARCH__PER_PAGE" => {
                self.search.per_page = parse_env(path, value)?;
            }
            "SEARCH__MAX_DISTANCE" => {
                self.search.max_distance = parse_env(path, value)?;
            }
            "SEARCH__MAX_MATCHED_TERMS" => {
                self.search.max_matched_terms = parse_env(path, value)?;
            }
            "CLASSIFIER__MIN_TOPIC_RECORDS" => {
                self.classifier.min_topic_records = parse_env(path, value)?;
            }
            "CLASSIFIER__MIN_TOPIC_NAME_LEN" => {
                self.classifier.min_topic_name_len = parse_env(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SrpaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("srpa").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| SrpaError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".srpa"))
    }

    /// Location of the SQLite database inside the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.storage.data_dir)?.join("srpa.sqlite"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| SrpaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| SrpaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SrpaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
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
                data_dir: PathBuf::from("~/.srpa"),
            },
            search: SearchConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}
