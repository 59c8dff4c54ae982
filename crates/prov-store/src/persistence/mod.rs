//! Row storage behind the provenance store
//!
//! Engines hold JSON rows keyed by `(EntityKind, id)`, with at most one
//! unique key per row and single-level transactions. The store layer
//! handles nesting.

mod json_file;
mod memory;

pub use json_file::JsonFileEngine;
pub use memory::MemoryEngine;

use crate::id::EntityKind;
use serde_json::Value;
use std::path::PathBuf;

/// Persistence engine error
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Unique key already held by another row
    #[error("{kind} unique key {key} is held by {holder}")]
    UniqueViolation {
        kind: EntityKind,
        key: String,
        holder: String,
    },

    #[error("no transaction in progress")]
    NoTransaction,

    #[error("a transaction is already in progress")]
    TransactionActive,

    /// Backing file could not be read or written
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file is not a valid table document
    #[error("malformed store document: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Engine result alias
pub type EngineResult<T> = std::result::Result<T, PersistenceError>;

/// Durable, key-indexed row storage
///
/// Every call is atomic on its own. `begin`/`commit`/`rollback` group a
/// sequence of writes; nesting is not supported at this level.
pub trait PersistenceEngine {
    /// Read one row
    ///
    /// # Errors
    /// Engine-specific read failure
    fn get(&self, kind: EntityKind, id: &str) -> EngineResult<Option<Value>>;

    /// Insert or replace a row, (re)binding its unique key
    ///
    /// # Errors
    /// [`PersistenceError::UniqueViolation`] if `unique_key` belongs to a
    /// different id
    fn put(
        &mut self,
        kind: EntityKind,
        id: &str,
        row: Value,
        unique_key: Option<&str>,
    ) -> EngineResult<()>;

    /// Remove a row and release its unique key; returns whether it existed
    ///
    /// # Errors
    /// Engine-specific write failure
    fn remove(&mut self, kind: EntityKind, id: &str) -> EngineResult<bool>;

    /// Id of the row holding `key`
    ///
    /// # Errors
    /// Engine-specific read failure
    fn find_unique(&self, kind: EntityKind, key: &str) -> EngineResult<Option<String>>;

    /// Every row of a table, ordered by id
    ///
    /// # Errors
    /// Engine-specific read failure
    fn scan(&self, kind: EntityKind) -> EngineResult<Vec<Value>>;

    /// # Errors
    /// [`PersistenceError::TransactionActive`] if one is already open
    fn begin(&mut self) -> EngineResult<()>;

    /// # Errors
    /// [`PersistenceError::NoTransaction`] if none is open, or a flush failure
    fn commit(&mut self) -> EngineResult<()>;

    /// # Errors
    /// [`PersistenceError::NoTransaction`] if none is open
    fn rollback(&mut self) -> EngineResult<()>;
}
