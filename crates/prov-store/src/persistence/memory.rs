//! In-memory engine with snapshot transactions

use super::{EngineResult, PersistenceEngine, PersistenceError};
use crate::id::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Table {
    rows: BTreeMap<String, Value>,
    #[serde(default)]
    unique: BTreeMap<String, String>,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

impl Table {
    fn put(
        &mut self,
        kind: EntityKind,
        id: &str,
        row: Value,
        unique_key: Option<&str>,
    ) -> EngineResult<()> {
        if let Some(key) = unique_key {
            if let Some(holder) = self.unique.get(key) {
                if holder != id {
                    return Err(PersistenceError::UniqueViolation {
                        kind,
                        key: key.to_string(),
                        holder: holder.clone(),
                    });
                }
            }
        }

        if let Some(previous) = self.keys.remove(id) {
            self.unique.remove(&previous);
        }
        if let Some(key) = unique_key {
            self.unique.insert(key.to_string(), id.to_string());
            self.keys.insert(id.to_string(), key.to_string());
        }
        self.rows.insert(id.to_string(), row);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        if let Some(key) = self.keys.remove(id) {
            self.unique.remove(&key);
        }
        self.rows.remove(id).is_some()
    }
}

/// The four tables, serializable as one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct Tables {
    #[serde(default)]
    files: Table,
    #[serde(default)]
    records: Table,
    #[serde(default)]
    pipelines: Table,
    #[serde(default)]
    experiments: Table,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> &Table {
        match kind {
            EntityKind::File => &self.files,
            EntityKind::Record => &self.records,
            EntityKind::Pipeline => &self.pipelines,
            EntityKind::Experiment => &self.experiments,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut Table {
        match kind {
            EntityKind::File => &mut self.files,
            EntityKind::Record => &mut self.records,
            EntityKind::Pipeline => &mut self.pipelines,
            EntityKind::Experiment => &mut self.experiments,
        }
    }
}

/// Volatile row storage
///
/// A transaction snapshots every table on `begin`; `rollback` restores it.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_tables(tables: Tables) -> Self {
        Self {
            tables,
            snapshot: None,
        }
    }

    pub(super) fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Whether a transaction is open
    #[inline]
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of rows in a table
    #[must_use]
    pub fn row_count(&self, kind: EntityKind) -> usize {
        self.tables.table(kind).rows.len()
    }
}

impl PersistenceEngine for MemoryEngine {
    fn get(&self, kind: EntityKind, id: &str) -> EngineResult<Option<Value>> {
        Ok(self.tables.table(kind).rows.get(id).cloned())
    }

    fn put(
        &mut self,
        kind: EntityKind,
        id: &str,
        row: Value,
        unique_key: Option<&str>,
    ) -> EngineResult<()> {
        self.tables.table_mut(kind).put(kind, id, row, unique_key)
    }

    fn remove(&mut self, kind: EntityKind, id: &str) -> EngineResult<bool> {
        Ok(self.tables.table_mut(kind).remove(id))
    }

    fn find_unique(&self, kind: EntityKind, key: &str) -> EngineResult<Option<String>> {
        Ok(self.tables.table(kind).unique.get(key).cloned())
    }

    fn scan(&self, kind: EntityKind) -> EngineResult<Vec<Value>> {
        Ok(self.tables.table(kind).rows.values().cloned().collect())
    }

    fn begin(&mut self) -> EngineResult<()> {
        if self.snapshot.is_some() {
            return Err(PersistenceError::TransactionActive);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(PersistenceError::NoTransaction)
    }

    fn rollback(&mut self) -> EngineResult<()> {
        let snapshot = self.snapshot.take().ok_or(PersistenceError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }
}
