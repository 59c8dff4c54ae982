//! Single-document JSON file engine

use super::memory::{MemoryEngine, Tables};
use super::{EngineResult, PersistenceEngine, PersistenceError};
use crate::id::EntityKind;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Row storage persisted as one JSON document
///
/// Rows live in a [`MemoryEngine`]; the whole document is rewritten
/// through a temporary file and a rename after every write made outside a
/// transaction and on every commit. A write that cannot be flushed is
/// undone in memory as well.
#[derive(Debug)]
pub struct JsonFileEngine {
    path: PathBuf,
    memory: MemoryEngine,
}

impl JsonFileEngine {
    /// Open the document at `path`, starting empty if it does not exist
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        let memory = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => MemoryEngine::new(),
            Ok(bytes) => MemoryEngine::from_tables(serde_json::from_slice::<Tables>(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryEngine::new(),
            Err(e) => return Err(PersistenceError::io(&path, e)),
        };
        tracing::debug!(path = %path.display(), "opened store document");
        Ok(Self { path, memory })
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> EngineResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(self.memory.tables())?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| PersistenceError::io(&self.path, e))?;

        tracing::trace!(path = %self.path.display(), bytes = bytes.len(), "flushed store document");
        Ok(())
    }

    /// Apply `op` to the rows; outside a transaction it runs as its own one
    fn write<T>(
        &mut self,
        op: impl FnOnce(&mut MemoryEngine) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.memory.in_transaction() {
            return op(&mut self.memory);
        }
        self.memory.begin()?;
        match op(&mut self.memory) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.memory.rollback()?;
                Err(e)
            }
        }
    }
}

impl PersistenceEngine for JsonFileEngine {
    fn get(&self, kind: EntityKind, id: &str) -> EngineResult<Option<Value>> {
        self.memory.get(kind, id)
    }

    fn put(
        &mut self,
        kind: EntityKind,
        id: &str,
        row: Value,
        unique_key: Option<&str>,
    ) -> EngineResult<()> {
        self.write(|memory| memory.put(kind, id, row, unique_key))
    }

    fn remove(&mut self, kind: EntityKind, id: &str) -> EngineResult<bool> {
        self.write(|memory| memory.remove(kind, id))
    }

    fn find_unique(&self, kind: EntityKind, key: &str) -> EngineResult<Option<String>> {
        self.memory.find_unique(kind, key)
    }

    fn scan(&self, kind: EntityKind) -> EngineResult<Vec<Value>> {
        self.memory.scan(kind)
    }

    fn begin(&mut self) -> EngineResult<()> {
        self.memory.begin()
    }

    /// Flush the pending rows, then release the snapshot
    ///
    /// A failed flush restores the snapshot, so memory never runs ahead of
    /// the document on disk.
    fn commit(&mut self) -> EngineResult<()> {
        if !self.memory.in_transaction() {
            return Err(PersistenceError::NoTransaction);
        }
        if let Err(e) = self.flush() {
            self.memory.rollback()?;
            tracing::warn!(path = %self.path.display(), error = %e, "flush failed, transaction rolled back");
            return Err(e);
        }
        self.memory.commit()
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.memory.rollback()
    }
}
