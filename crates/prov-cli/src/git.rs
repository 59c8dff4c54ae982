//! Git-backed revision source
//!
//! Shells out to the `git` binary in the project root. Files at or above
//! the configured size are routed through `git lfs track` before staging.

use prov_store::{RevisionError, RevisionResult, RevisionSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Revision source over a git working tree
#[derive(Debug, Clone)]
pub struct GitRevisionSource {
    root: PathBuf,
    lfs_threshold: u64,
}

impl GitRevisionSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, lfs_threshold: u64) -> Self {
        Self {
            root: root.into(),
            lfs_threshold,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the repository if needed and keep the state dir out of it
    ///
    /// # Errors
    /// Returns error if git fails or `.gitignore` cannot be written
    pub fn init_repository(&self, ignored: &str) -> RevisionResult<()> {
        if !self.root.join(".git").exists() {
            self.git(&["init", "--quiet"])?;
            tracing::info!(root = %self.root.display(), "initialized git repository");
        }

        let ignore_file = self.root.join(".gitignore");
        let current = match fs::read_to_string(&ignore_file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let entry = format!("{ignored}/");
        if !current.lines().any(|line| line.trim() == entry) {
            let mut updated = current;
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&entry);
            updated.push('\n');
            fs::write(&ignore_file, updated)?;
        }
        Ok(())
    }

    fn run(&self, args: &[&str]) -> RevisionResult<Output> {
        tracing::trace!(?args, "git");
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?)
    }

    /// Run git, failing on a non-zero exit
    fn git(&self, args: &[&str]) -> RevisionResult<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(RevisionError::command(
                format!("git {}", args.join(" ")),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn stage(&self, paths: &[String]) -> RevisionResult<()> {
        let mut tracked_by_lfs = false;
        for path in paths {
            let size = fs::metadata(self.root.join(path)).map_or(0, |m| m.len());
            if size >= self.lfs_threshold {
                self.git(&["lfs", "track", "--", path])?;
                tracked_by_lfs = true;
                tracing::info!(%path, size, "tracking with git-lfs");
            }
        }

        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        if tracked_by_lfs {
            args.push(".gitattributes");
        }
        self.git(&args)?;
        Ok(())
    }

    fn head(&self) -> RevisionResult<String> {
        self.head_revision()?
            .ok_or_else(|| RevisionError::command("git rev-parse HEAD", "no commit after commit"))
    }
}

impl RevisionSource for GitRevisionSource {
    fn is_tracked(&self, path: &str) -> RevisionResult<bool> {
        let listed = self.git(&["ls-files", "--", path])?;
        Ok(!listed.trim().is_empty())
    }

    fn current_revision(&self, path: &str) -> RevisionResult<Option<String>> {
        if self.head_revision()?.is_none() {
            return Ok(None);
        }
        let id = self.git(&["log", "-n", "1", "--format=%H", "--", path])?;
        let id = id.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    fn stage_and_commit(&mut self, paths: &[String], message: &str) -> RevisionResult<String> {
        if paths.is_empty() {
            return Err(RevisionError::NothingToCommit);
        }
        self.stage(paths)?;
        self.git(&["commit", "--quiet", "-m", message])?;
        let id = self.head()?;
        tracing::info!(commit = %id, files = paths.len(), "committed");
        Ok(id)
    }

    fn amend_last_commit(
        &mut self,
        paths: &[String],
        message: Option<&str>,
    ) -> RevisionResult<String> {
        if self.head_revision()?.is_none() {
            return Err(RevisionError::NoCommitToAmend);
        }
        if !paths.is_empty() {
            self.stage(paths)?;
        }
        match message {
            Some(message) => self.git(&["commit", "--quiet", "--amend", "-m", message])?,
            None => self.git(&["commit", "--quiet", "--amend", "--no-edit"])?,
        };
        let id = self.head()?;
        tracing::info!(commit = %id, files = paths.len(), "amended last commit");
        Ok(id)
    }

    fn head_revision(&self) -> RevisionResult<Option<String>> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    fn has_pending_changes(&self, path: &str) -> RevisionResult<bool> {
        let status = self.git(&["status", "--porcelain", "--", path])?;
        Ok(!status.trim().is_empty())
    }
}
