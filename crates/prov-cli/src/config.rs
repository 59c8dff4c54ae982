//! Project configuration
//!
//! Stored as YAML in `.prov/config.yaml`. Relative paths are resolved
//! against the project root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding all provenance state
pub const STATE_DIR: &str = ".prov";

/// Config file name inside [`STATE_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// Files at or above this size are committed through git-lfs
pub const DEFAULT_LFS_THRESHOLD: u64 = 1_000_000;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("not a provenance project (no {0}); run `prov init` first")]
    NotInitialized(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvConfig {
    /// Store document
    pub database_file: PathBuf,
    /// Where datasets are expected to live
    pub data_dir: PathBuf,
    /// Where experiment outputs are expected to live
    pub experiment_dir: PathBuf,
    /// Log output
    pub log_file: PathBuf,
    /// Size in bytes from which files go through git-lfs
    pub lfs_threshold_bytes: u64,
}

impl Default for ProvConfig {
    fn default() -> Self {
        Self {
            database_file: Path::new(STATE_DIR).join("prov.json"),
            data_dir: PathBuf::from("data"),
            experiment_dir: PathBuf::from("experiments"),
            log_file: Path::new(STATE_DIR).join("log.txt"),
            lfs_threshold_bytes: DEFAULT_LFS_THRESHOLD,
        }
    }
}

impl ProvConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set store document path
    #[inline]
    #[must_use]
    pub fn with_database_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_file = path.into();
        self
    }

    /// Set data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Set experiment directory
    #[inline]
    #[must_use]
    pub fn with_experiment_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.experiment_dir = path.into();
        self
    }

    /// Set log file
    #[inline]
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set git-lfs threshold
    #[inline]
    #[must_use]
    pub fn with_lfs_threshold(mut self, bytes: u64) -> Self {
        self.lfs_threshold_bytes = bytes;
        self
    }

    /// Location of the config file under `root`
    #[must_use]
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Read a YAML config from an arbitrary file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the project config under `root`
    ///
    /// # Errors
    /// [`ConfigError::NotInitialized`] if the project has no config
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(root);
        if !path.exists() {
            return Err(ConfigError::NotInitialized(path));
        }
        Self::from_file(&path)
    }

    /// Write the config under `root`, creating the state directory
    ///
    /// # Errors
    /// Returns error on any filesystem failure
    pub fn save(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let path = Self::path_in(root);
        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir).map_err(|e| ConfigError::io(&dir, e))?;
        let text = serde_yaml::to_string(self).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|e| ConfigError::io(&path, e))?;
        Ok(path)
    }

    /// Resolve a configured path against `root`
    #[must_use]
    pub fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}
