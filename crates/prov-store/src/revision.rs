//! Revision source interface
//!
//! The store never talks to version control directly. It asks a
//! [`RevisionSource`] whether a path is tracked, what revision it is at,
//! and to commit paths it has to start tracking.

use std::collections::{BTreeMap, BTreeSet};

/// Revision source error
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// External command failed
    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    /// Command could not be spawned or its output read
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Amend requested before any commit exists
    #[error("no commit to amend")]
    NoCommitToAmend,

    /// Nothing was given to commit
    #[error("nothing to commit")]
    NothingToCommit,
}

impl RevisionError {
    /// Create command failure error
    #[inline]
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Check if the failure may go away on retry
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Command { .. } | Self::Io(_))
    }
}

/// Revision result alias
pub type RevisionResult<T> = std::result::Result<T, RevisionError>;

/// Commit and tracking state for project files
pub trait RevisionSource {
    /// Whether `path` is known to version control
    ///
    /// # Errors
    /// Source-specific failure
    fn is_tracked(&self, path: &str) -> RevisionResult<bool>;

    /// Last commit touching `path`, if any
    ///
    /// # Errors
    /// Source-specific failure
    fn current_revision(&self, path: &str) -> RevisionResult<Option<String>>;

    /// Stage `paths` and create a new commit; returns its id
    ///
    /// # Errors
    /// Source-specific failure
    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> RevisionResult<String>;

    /// Stage `paths` into the last commit; returns the rewritten id
    ///
    /// `None` keeps the last commit's message.
    ///
    /// # Errors
    /// [`RevisionError::NoCommitToAmend`] if there is no commit yet
    fn amend_last_commit(
        &mut self,
        paths: &[String],
        message: Option<&str>,
    ) -> RevisionResult<String>;

    /// Most recent commit overall
    ///
    /// # Errors
    /// Source-specific failure
    fn head_revision(&self) -> RevisionResult<Option<String>>;

    /// Whether `path` differs from its last committed state
    ///
    /// # Errors
    /// Source-specific failure
    fn has_pending_changes(&self, path: &str) -> RevisionResult<bool>;
}

#[derive(Debug, Clone)]
struct Tracked {
    last_commit: String,
    dirty: bool,
}

/// Deterministic in-memory revision source
///
/// Commit ids are 40 hex characters derived from a counter. Amending
/// rewrites the last commit id everywhere, as a real amend would.
#[derive(Debug, Clone, Default)]
pub struct MemoryRevisionSource {
    files: BTreeMap<String, Tracked>,
    untracked: BTreeSet<String>,
    commits: Vec<String>,
    sequence: u64,
    commit_calls: usize,
    amend_calls: usize,
}

impl MemoryRevisionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as modified in the working tree
    pub fn touch(&mut self, path: &str) {
        match self.files.get_mut(path) {
            Some(tracked) => tracked.dirty = true,
            None => {
                self.untracked.insert(path.to_string());
            }
        }
    }

    /// Number of commits created (amends excluded)
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commit_calls
    }

    /// Number of amend operations performed
    #[inline]
    #[must_use]
    pub fn amend_count(&self) -> usize {
        self.amend_calls
    }

    /// Commit ids in history order
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.commits
    }

    fn next_id(&mut self) -> String {
        self.sequence += 1;
        let digest = blake3::hash(&self.sequence.to_le_bytes());
        let mut id = hex::encode(digest.as_bytes());
        id.truncate(40);
        id
    }

    fn record(&mut self, paths: &[String], commit: &str) {
        for path in paths {
            self.untracked.remove(path);
            self.files.insert(
                path.clone(),
                Tracked {
                    last_commit: commit.to_string(),
                    dirty: false,
                },
            );
        }
    }
}

impl RevisionSource for MemoryRevisionSource {
    fn is_tracked(&self, path: &str) -> RevisionResult<bool> {
        Ok(self.files.contains_key(path))
    }

    fn current_revision(&self, path: &str) -> RevisionResult<Option<String>> {
        Ok(self.files.get(path).map(|t| t.last_commit.clone()))
    }

    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> RevisionResult<String> {
        if paths.is_empty() {
            return Err(RevisionError::NothingToCommit);
        }
        let id = self.next_id();
        self.commits.push(id.clone());
        self.commit_calls += 1;
        self.record(paths, &id);
        tracing::debug!(commit = %id, files = paths.len(), subject = message, "memory commit");
        Ok(id)
    }

    fn amend_last_commit(
        &mut self,
        paths: &[String],
        message: Option<&str>,
    ) -> RevisionResult<String> {
        let previous = self.commits.pop().ok_or(RevisionError::NoCommitToAmend)?;
        let id = self.next_id();
        self.commits.push(id.clone());
        self.amend_calls += 1;

        for tracked in self.files.values_mut() {
            if tracked.last_commit == previous {
                tracked.last_commit.clone_from(&id);
            }
        }
        self.record(paths, &id);
        tracing::debug!(from = %previous, to = %id, files = paths.len(), subject = message.unwrap_or("<unchanged>"), "memory amend");
        Ok(id)
    }

    fn head_revision(&self) -> RevisionResult<Option<String>> {
        Ok(self.commits.last().cloned())
    }

    fn has_pending_changes(&self, path: &str) -> RevisionResult<bool> {
        Ok(match self.files.get(path) {
            Some(tracked) => tracked.dirty,
            None => self.untracked.contains(path),
        })
    }
}
