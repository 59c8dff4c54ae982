//! Project layout: config, state directory, store and revision source

use crate::config::{ConfigError, ProvConfig, STATE_DIR};
use crate::git::GitRevisionSource;
use prov_store::{JsonFileEngine, PersistenceError, ProvenanceStore, StoreOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// An initialized project rooted at a directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: ProvConfig,
}

impl Project {
    /// Open an initialized project
    ///
    /// # Errors
    /// [`ConfigError::NotInitialized`] if `prov init` has not been run
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = ProvConfig::load(&root)?;
        Ok(Self { root, config })
    }

    /// Write the config and create the configured directories
    ///
    /// Existing directories, log and store files are left as they are.
    ///
    /// # Errors
    /// Returns error on any filesystem failure
    pub fn init(root: impl Into<PathBuf>, config: ProvConfig) -> Result<Self, ConfigError> {
        let root = root.into();
        config.save(&root)?;

        for dir in [&config.data_dir, &config.experiment_dir] {
            let path = ProvConfig::resolve(&root, dir);
            fs::create_dir_all(&path).map_err(|e| ConfigError::io(&path, e))?;
        }
        let log = ProvConfig::resolve(&root, &config.log_file);
        for file in [&log, &ProvConfig::resolve(&root, &config.database_file)] {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
            }
            if !file.exists() {
                fs::write(file, "").map_err(|e| ConfigError::io(file, e))?;
            }
        }

        tracing::info!(root = %root.display(), "initialized project");
        Ok(Self { root, config })
    }

    /// Remove the state directory; returns whether it existed
    ///
    /// # Errors
    /// Returns error if the directory cannot be removed
    pub fn clean(root: &Path) -> Result<bool, ConfigError> {
        let dir = root.join(STATE_DIR);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| ConfigError::io(&dir, e))?;
        tracing::info!(dir = %dir.display(), "removed state directory");
        Ok(true)
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProvConfig {
        &self.config
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        ProvConfig::resolve(&self.root, &self.config.database_file)
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        ProvConfig::resolve(&self.root, &self.config.log_file)
    }

    /// Open the project's store
    ///
    /// # Errors
    /// Returns error if the store document cannot be read
    pub fn store(&self) -> Result<ProvenanceStore<JsonFileEngine>, PersistenceError> {
        let engine = JsonFileEngine::open(self.database_path())?;
        let options = StoreOptions::default().with_project_root(&self.root);
        Ok(ProvenanceStore::new(engine, options))
    }

    /// Revision source over the project's git working tree
    #[must_use]
    pub fn revisions(&self) -> GitRevisionSource {
        GitRevisionSource::new(&self.root, self.config.lfs_threshold_bytes)
    }
}
