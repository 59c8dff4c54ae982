//! Entity store: typed access to the four tables over a persistence engine

use crate::error::{Result, StoreError};
use crate::id::EntityKind;
use crate::model::{
    Entity, Experiment, ExperimentId, File, FileId, Pipeline, PipelineId, Record, RecordId,
};
use crate::path::normalize_path;
use crate::persistence::{MemoryEngine, PersistenceEngine, PersistenceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Root that absolute and `./` paths are made relative to
    pub project_root: PathBuf,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
        }
    }
}

impl StoreOptions {
    /// Set project root
    #[inline]
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }
}

/// Provenance store over a [`PersistenceEngine`]
///
/// Every mutating entry point runs inside [`ProvenanceStore::atomic`], so a
/// failure part-way through leaves the tables exactly as they were.
#[derive(Debug)]
pub struct ProvenanceStore<E: PersistenceEngine = MemoryEngine> {
    engine: E,
    options: StoreOptions,
    depth: usize,
}

impl ProvenanceStore<MemoryEngine> {
    /// Volatile store with default options
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryEngine::new(), StoreOptions::default())
    }
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    #[must_use]
    pub fn new(engine: E, options: StoreOptions) -> Self {
        Self {
            engine,
            options,
            depth: 0,
        }
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run `op` as one transaction
    ///
    /// Nested calls join the outermost transaction. Only the outermost call
    /// commits; an error escaping it rolls everything back.
    ///
    /// # Errors
    /// The error returned by `op`, or a persistence failure on begin/commit
    pub fn atomic<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth == 0 {
            self.engine.begin()?;
        }
        self.depth += 1;
        let result = op(self);
        self.depth -= 1;
        if self.depth > 0 {
            return result;
        }

        match result {
            Ok(value) => {
                self.engine.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.engine.rollback() {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                tracing::debug!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    /// Normalize a user-supplied path against the project root
    ///
    /// # Errors
    /// [`StoreError::InvalidPath`] for paths outside the root
    pub fn normalize(&self, path: &str) -> Result<String> {
        normalize_path(path, &self.options.project_root)
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.options.project_root
    }

    // ---- typed row access ----

    pub(crate) fn load<T: Entity>(&self, id: &T::Id) -> Result<Option<T>> {
        match self.engine.get(T::KIND, id.as_ref())? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn require<T: Entity>(&self, id: &T::Id) -> Result<T> {
        self.load(id)?
            .ok_or_else(|| StoreError::not_found(T::KIND, id.as_ref()))
    }

    /// Write back an entity that already has a row
    pub(crate) fn save<T: Entity>(&mut self, entity: &T) -> Result<()> {
        let key = entity.unique_key()?;
        let row = serde_json::to_value(entity)?;
        self.engine
            .put(T::KIND, entity.id().as_ref(), row, key.as_deref())
            .map_err(|e| match e {
                PersistenceError::UniqueViolation { kind, key, .. } => {
                    StoreError::DuplicateEntity { kind, key }
                }
                other => other.into(),
            })
    }

    /// Write a new entity, refusing to overwrite an existing id
    pub(crate) fn insert<T: Entity>(&mut self, entity: &T) -> Result<()> {
        if self.engine.get(T::KIND, entity.id().as_ref())?.is_some() {
            return Err(StoreError::DuplicateEntity {
                kind: T::KIND,
                key: entity.id().to_string(),
            });
        }
        self.save(entity)
    }

    pub(crate) fn erase<T: Entity>(&mut self, id: &T::Id) -> Result<bool> {
        Ok(self.engine.remove(T::KIND, id.as_ref())?)
    }

    pub(crate) fn scan<T: Entity>(&self) -> Result<Vec<T>> {
        self.engine
            .scan(T::KIND)?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    pub(crate) fn find_unique<T: Entity>(&self, key: &str) -> Result<Option<T>> {
        match self.engine.find_unique(T::KIND, key)? {
            Some(id) => match self.engine.get(T::KIND, &id)? {
                Some(row) => Ok(Some(serde_json::from_value(row)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    // ---- read accessors ----

    /// # Errors
    /// [`StoreError::NotFound`] if no such File exists
    pub fn get_file(&self, id: &FileId) -> Result<File> {
        self.require(id)
    }

    /// # Errors
    /// [`StoreError::NotFound`] if no such Record exists
    pub fn get_record(&self, id: &RecordId) -> Result<Record> {
        self.require(id)
    }

    /// # Errors
    /// [`StoreError::NotFound`] if no such Pipeline exists
    pub fn get_pipeline(&self, id: &PipelineId) -> Result<Pipeline> {
        self.require(id)
    }

    /// # Errors
    /// [`StoreError::NotFound`] if no such Experiment exists
    pub fn get_experiment(&self, id: &ExperimentId) -> Result<Experiment> {
        self.require(id)
    }

    /// # Errors
    /// Persistence or decoding failure
    pub fn all_files(&self) -> Result<Vec<File>> {
        self.scan()
    }

    /// # Errors
    /// Persistence or decoding failure
    pub fn all_records(&self) -> Result<Vec<Record>> {
        self.scan()
    }

    /// # Errors
    /// Persistence or decoding failure
    pub fn all_pipelines(&self) -> Result<Vec<Pipeline>> {
        self.scan()
    }

    /// # Errors
    /// Persistence or decoding failure
    pub fn all_experiments(&self) -> Result<Vec<Experiment>> {
        self.scan()
    }

    /// File registered under `path`, if any
    ///
    /// # Errors
    /// [`StoreError::InvalidPath`] or a persistence failure
    pub fn find_file(&self, path: &str) -> Result<Option<File>> {
        let path = self.normalize(path)?;
        self.find_unique(&path)
    }

    /// # Errors
    /// [`StoreError::NotFound`] if no File is registered under `path`
    pub fn file_by_path(&self, path: &str) -> Result<File> {
        let normalized = self.normalize(path)?;
        self.find_unique(&normalized)?
            .ok_or_else(|| StoreError::not_found(EntityKind::File, normalized))
    }

    /// Record of `file_id` at `commit_id`, if any
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn find_record(&self, file_id: &FileId, commit_id: &str) -> Result<Option<Record>> {
        self.find_unique(&Record::revision_key(file_id, commit_id))
    }

    /// Every Record owned by `file_id`
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn records_of_file(&self, file_id: &FileId) -> Result<Vec<Record>> {
        Ok(self
            .all_records()?
            .into_iter()
            .filter(|r| &r.file_id == file_id)
            .collect())
    }

    /// Every Experiment run from `pipeline_id`
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn experiments_of_pipeline(&self, pipeline_id: &PipelineId) -> Result<Vec<Experiment>> {
        Ok(self
            .all_experiments()?
            .into_iter()
            .filter(|e| &e.pipeline_id == pipeline_id)
            .collect())
    }

    /// A pipeline's stages expressed as file paths
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if a referenced File is missing
    pub fn pipeline_paths(&self, pipeline: &Pipeline) -> Result<Vec<Vec<String>>> {
        let paths: HashMap<FileId, String> = self
            .all_files()?
            .into_iter()
            .map(|f| (f.id, f.path))
            .collect();
        pipeline
            .file_id_lists
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .map(|id| {
                        paths
                            .get(id)
                            .cloned()
                            .ok_or_else(|| StoreError::not_found(EntityKind::File, id.as_str()))
                    })
                    .collect()
            })
            .collect()
    }

    // ---- creation ----

    /// Register a new File
    ///
    /// # Errors
    /// [`StoreError::DuplicateEntity`] if `path` is already registered
    pub fn create_file(&mut self, path: &str) -> Result<File> {
        let path = self.normalize(path)?;
        self.atomic(|store| {
            let file = File::new(path);
            store.insert(&file)?;
            tracing::info!(id = %file.id, path = %file.path, "registered file");
            Ok(file)
        })
    }

    /// File for `path`, registering it on first reference
    ///
    /// # Errors
    /// [`StoreError::InvalidPath`] or a persistence failure
    pub fn get_or_create_file(&mut self, path: &str) -> Result<File> {
        let path = self.normalize(path)?;
        if let Some(file) = self.find_unique::<File>(&path)? {
            return Ok(file);
        }
        self.atomic(|store| {
            let file = File::new(path);
            store.insert(&file)?;
            tracing::info!(id = %file.id, path = %file.path, "registered file");
            Ok(file)
        })
    }

    /// Record for `file_id` at `commit_id`, creating it on first reference
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the File does not exist
    pub fn get_or_create_record(&mut self, file_id: &FileId, commit_id: &str) -> Result<Record> {
        if let Some(record) = self.find_record(file_id, commit_id)? {
            return Ok(record);
        }
        self.atomic(|store| {
            let _: File = store.require(file_id)?;
            let record = Record::new(file_id.clone(), commit_id);
            store.insert(&record)?;
            tracing::info!(id = %record.id, file = %file_id, commit = %commit_id, "registered record");
            Ok(record)
        })
    }
}
