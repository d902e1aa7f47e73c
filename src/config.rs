//! Indexer configuration.
//!
//! Values come from an optional TOML file (`.symbol-indexer.toml` in the
//! working directory, or an explicit path); command line flags override them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};
use crate::indexer::ScanOptions;

pub const DEFAULT_CONFIG_FILE: &str = ".symbol-indexer.toml";
pub const DEFAULT_DB_PATH: &str = ".symbol-index.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    pub db_path: PathBuf,
    pub project_paths: Vec<PathBuf>,
    /// Glob patterns matched against absolute file paths
    pub excludes: Vec<String>,
    /// File suffixes to index, e.g. `.py`; empty means every supported extension
    pub include_suffixes: Vec<String>,
    /// Worker threads; unset or negative means one per CPU, 0 or 1 parses inline
    pub parallelism: Option<i64>,
    /// Seconds before a running parse is reported as slow
    pub watchdog_secs: u64,
    pub batch_size: usize,
    pub channel_capacity: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            project_paths: Vec::new(),
            excludes: Vec::new(),
            include_suffixes: Vec::new(),
            parallelism: None,
            watchdog_secs: 5,
            batch_size: 32,
            channel_capacity: 256,
        }
    }
}

impl IndexerConfig {
    /// Loads `path`, or `.symbol-indexer.toml` when `path` is `None`.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(IndexerError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| IndexerError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e: toml::de::Error| IndexerError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IndexerError::Config("batch_size must be at least 1".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(IndexerError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Scan options for the configured project paths.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            project_paths: self.project_paths.clone(),
            excludes: self.excludes.clone(),
            include_suffixes: self.include_suffixes.clone(),
            parallelism: self.parallelism,
            force: false,
            batch_size: self.batch_size,
            channel_capacity: self.channel_capacity,
            watchdog_timeout: Duration::from_secs(self.watchdog_secs),
        }
    }
}
