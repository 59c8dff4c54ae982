//! Project-relative path normalization

use crate::error::{Result, StoreError};
use std::path::{Component, Path};

/// Normalize `path` into a project-relative, `/`-separated form
///
/// Plain relative paths are kept as given. Absolute paths and paths that
/// start with `./` are resolved lexically against `root`.
///
/// # Errors
/// [`StoreError::InvalidPath`] if the path is empty, escapes `root`, or
/// names `root` itself
pub fn normalize_path(path: &str, root: &Path) -> Result<String> {
    if path.trim().is_empty() {
        return Err(StoreError::invalid_path(path, "empty path"));
    }

    let candidate = Path::new(path);
    let anchored = candidate.is_absolute() || path.starts_with("./");
    if !anchored {
        return Ok(path.replace('\\', "/"));
    }

    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let absolute = lexical(&absolute);
    let root = lexical(root);

    let relative = absolute
        .strip_prefix(&root)
        .map_err(|_| StoreError::invalid_path(path, "outside the project root"))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(StoreError::invalid_path(path, "names the project root"));
    }
    Ok(parts.join("/"))
}

/// Drop `.` and fold `..` without touching the filesystem
fn lexical(path: &Path) -> std::path::PathBuf {
    let mut out = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> &'static Path {
        Path::new("/work/project")
    }

    #[test]
    fn plain_relative_path_is_verbatim() {
        assert_eq!(normalize_path("data/raw.csv", root()).unwrap(), "data/raw.csv");
    }

    #[test]
    fn dot_prefix_is_resolved() {
        assert_eq!(normalize_path("./data/./raw.csv", root()).unwrap(), "data/raw.csv");
        assert_eq!(normalize_path("./src/../train.py", root()).unwrap(), "train.py");
    }

    #[test]
    fn absolute_path_inside_root() {
        assert_eq!(
            normalize_path("/work/project/models/net.pt", root()).unwrap(),
            "models/net.pt"
        );
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        for path in ["/etc/passwd", "./../other/file", "/work/project"] {
            let err = normalize_path(path, root()).unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath { .. }), "{path}");
        }
        assert!(normalize_path("  ", root()).is_err());
    }
}
