//! Commit changed files and register their Records

use crate::error::{Result, StoreError};
use crate::model::Record;
use crate::persistence::PersistenceEngine;
use crate::revision::RevisionSource;
use crate::store::ProvenanceStore;

/// Result of [`ProvenanceStore::watch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOutcome {
    /// Commit created or amended, if anything needed committing
    pub commit_id: Option<String>,
    /// Records registered for the watched paths
    pub records: Vec<Record>,
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// Start watching `paths` at their current revision
    ///
    /// Paths that are untracked or have pending changes are committed
    /// together, either as a new commit or by amending the last one. A new
    /// commit needs a `message`; an amend without one keeps the old message.
    /// Paths that already have a Record at their current revision are left
    /// alone.
    ///
    /// # Errors
    /// [`StoreError::MissingRequiredField`] for a new commit without a
    /// message, [`StoreError::NoRevision`] if a path is still uncommitted,
    /// or the revision source's failure unchanged
    pub fn watch<R>(
        &mut self,
        revisions: &mut R,
        paths: &[String],
        message: Option<&str>,
        amend: bool,
    ) -> Result<WatchOutcome>
    where
        R: RevisionSource + ?Sized,
    {
        let message = message.filter(|m| !m.trim().is_empty());
        let mut normalized: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = self.normalize(path)?;
            if !normalized.contains(&path) {
                normalized.push(path);
            }
        }

        let mut pending = Vec::new();
        for path in &normalized {
            if !revisions.is_tracked(path)? || revisions.has_pending_changes(path)? {
                pending.push(path.clone());
            }
        }

        let commit_id = if pending.is_empty() {
            tracing::info!("none of the watched files has been modified");
            None
        } else if amend {
            Some(revisions.amend_last_commit(&pending, message)?)
        } else {
            let message = message.ok_or(StoreError::MissingRequiredField("message"))?;
            Some(revisions.stage_and_commit(&pending, message)?)
        };

        let records = self.atomic(|store| {
            let mut records = Vec::new();
            for path in &normalized {
                let file = store.get_or_create_file(path)?;
                let commit = revisions
                    .current_revision(path)?
                    .ok_or_else(|| StoreError::NoRevision(path.clone()))?;
                if store.find_record(&file.id, &commit)?.is_some() {
                    continue;
                }
                records.push(store.get_or_create_record(&file.id, &commit)?);
            }
            Ok(records)
        })?;

        tracing::info!(
            commit = commit_id.as_deref().unwrap_or("-"),
            records = records.len(),
            "watching files"
        );
        Ok(WatchOutcome { commit_id, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::MemoryRevisionSource;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn new_files_are_committed_once() {
        let mut store = ProvenanceStore::in_memory();
        let mut git = MemoryRevisionSource::new();
        let outcome = store
            .watch(&mut git, &paths(&["a.py", "b.py", "./a.py"]), Some("track"), false)
            .unwrap();

        assert_eq!(git.commit_count(), 1);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.commit_id, git.head_revision().unwrap());
    }

    #[test]
    fn new_commit_needs_message() {
        let mut store = ProvenanceStore::in_memory();
        let mut git = MemoryRevisionSource::new();
        let err = store.watch(&mut git, &paths(&["a.py"]), None, false).unwrap_err();
        assert!(matches!(err, StoreError::MissingRequiredField("message")));
        assert_eq!(git.commit_count(), 0);
        assert!(store.all_files().unwrap().is_empty());
    }

    #[test]
    fn unchanged_files_are_not_recommitted() {
        let mut store = ProvenanceStore::in_memory();
        let mut git = MemoryRevisionSource::new();
        store.watch(&mut git, &paths(&["a.py"]), Some("one"), false).unwrap();

        let outcome = store.watch(&mut git, &paths(&["a.py"]), Some("two"), false).unwrap();
        assert_eq!(outcome.commit_id, None);
        assert!(outcome.records.is_empty());
        assert_eq!(git.commit_count(), 1);
    }

    #[test]
    fn amend_folds_changes_into_last_commit() {
        let mut store = ProvenanceStore::in_memory();
        let mut git = MemoryRevisionSource::new();
        store.watch(&mut git, &paths(&["a.py"]), Some("one"), false).unwrap();
        git.touch("a.py");

        let outcome = store.watch(&mut git, &paths(&["a.py"]), None, true).unwrap();
        assert_eq!(git.amend_count(), 1);
        assert_eq!(outcome.records.len(), 1);
        let file = store.file_by_path("a.py").unwrap();
        assert_eq!(store.records_of_file(&file.id).unwrap().len(), 2);
    }
}
