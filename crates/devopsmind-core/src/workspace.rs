//! Workspace materialization.
//!
//! A workspace is a persistent per-challenge directory the player edits.
//! Materializing refreshes every file the challenge ships and leaves every
//! other file alone, so re-running `play` never destroys player work.

use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never copied out of a challenge package.
const SKIPPED_DIRS: &[&str] = &["__pycache__", ".git", ".pytest_cache"];

/// File names and extensions never copied out of a challenge package.
const SKIPPED_FILES: &[&str] = &[".DS_Store", ".gitkeep"];
const SKIPPED_EXTENSIONS: &[&str] = &["pyc", "pyo"];

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOp {
    Copy,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializeFailure {
    /// Path relative to the workspace.
    pub path: PathBuf,
    pub op: FileOp,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub copied: usize,
    pub removed: usize,
    pub failures: Vec<MaterializeFailure>,
}

impl MaterializeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Skip rules
// ---------------------------------------------------------------------------

pub fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

pub fn is_skipped_file(name: &str) -> bool {
    if name.starts_with('.') || SKIPPED_FILES.contains(&name) {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SKIPPED_EXTENSIONS.contains(&ext))
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        !is_skipped_dir(&name)
    } else {
        !is_skipped_file(&name)
    }
}

/// True when any component of `rel` is hidden.
fn is_hidden_path(rel: &Path) -> bool {
    rel.components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// Relative paths of every regular file the challenge provides.
pub fn provided_files(source: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("cannot read challenge entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(source).ok().map(Path::to_path_buf))
        .collect()
}

// ---------------------------------------------------------------------------
// Materialize
// ---------------------------------------------------------------------------

/// Refresh `workspace` from `source`.
///
/// Workspace entries whose relative path matches a provided file are removed
/// and re-copied. Hidden entries are never removed. Per-file failures are
/// recorded in the report; only failing to create the workspace itself is
/// an error.
pub fn materialize(source: &Path, workspace: &Path) -> Result<MaterializeReport> {
    crate::io::ensure_dir(workspace)?;
    let files = provided_files(source);
    let mut report = MaterializeReport::default();

    for rel in &files {
        if is_hidden_path(rel) {
            continue;
        }
        let target = workspace.join(rel);
        let Ok(meta) = std::fs::symlink_metadata(&target) else {
            continue;
        };
        let removed = if meta.is_dir() {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_file(&target)
        };
        match removed {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!("failed to remove {}: {e}", target.display());
                report.failures.push(MaterializeFailure {
                    path: rel.clone(),
                    op: FileOp::Remove,
                    reason: e.to_string(),
                });
            }
        }
    }

    for rel in &files {
        let from = source.join(rel);
        let to = workspace.join(rel);
        let copied = to
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::copy(&from, &to).map(|_| ()));
        match copied {
            Ok(()) => report.copied += 1,
            Err(e) => {
                warn!("failed to copy {}: {e}", from.display());
                report.failures.push(MaterializeFailure {
                    path: rel.clone(),
                    op: FileOp::Copy,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        source = %source.display(),
        workspace = %workspace.display(),
        copied = report.copied,
        removed = report.removed,
        "workspace materialized"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn fresh_workspace_gets_every_provided_file() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        let workspace = ws.path().join("obs-easy");
        write(&src.path().join("app.log"), "INFO a\nERROR b\n");
        write(&src.path().join("nested/deep/conf.yaml"), "k: v\n");

        let report = materialize(src.path(), &workspace).unwrap();
        assert_eq!(report.copied, 2);
        assert_eq!(report.removed, 0);
        assert!(report.is_clean());
        assert_eq!(read(&workspace.join("nested/deep/conf.yaml")), "k: v\n");
    }

    #[test]
    fn provided_files_refreshed_and_player_files_preserved() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(&src.path().join("app.log"), "v2\n");
        write(&ws.path().join("app.log"), "stale edit\n");
        write(&ws.path().join("errors.log"), "ERROR b\n");
        write(&ws.path().join("notes/todo.md"), "mine\n");

        let report = materialize(src.path(), ws.path()).unwrap();
        assert_eq!(report.copied, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(read(&ws.path().join("app.log")), "v2\n");
        assert_eq!(read(&ws.path().join("errors.log")), "ERROR b\n");
        assert_eq!(read(&ws.path().join("notes/todo.md")), "mine\n");
    }

    #[test]
    fn hidden_and_cache_entries_not_copied() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(&src.path().join("metrics.py"), "print(1)\n");
        write(&src.path().join("__pycache__/metrics.cpython-312.pyc"), "x");
        write(&src.path().join(".git/HEAD"), "ref\n");
        write(&src.path().join(".pytest_cache/v"), "x");
        write(&src.path().join("old.pyc"), "x");
        write(&src.path().join(".DS_Store"), "x");
        write(&src.path().join("keep/.gitkeep"), "");

        let report = materialize(src.path(), ws.path()).unwrap();
        assert_eq!(report.copied, 1);
        assert!(ws.path().join("metrics.py").exists());
        assert!(!ws.path().join("__pycache__").exists());
        assert!(!ws.path().join(".git").exists());
        assert!(!ws.path().join("old.pyc").exists());
        assert!(!ws.path().join(".DS_Store").exists());
    }

    #[test]
    fn player_git_repo_survives_refresh() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(&src.path().join("login.txt"), "seed\n");
        write(&src.path().join(".git/HEAD"), "challenge head\n");
        write(&ws.path().join(".git/HEAD"), "ref: refs/heads/main\n");

        materialize(src.path(), ws.path()).unwrap();
        assert_eq!(read(&ws.path().join(".git/HEAD")), "ref: refs/heads/main\n");
    }

    #[test]
    fn directory_in_workspace_replaced_by_provided_file() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(&src.path().join("alert.py"), "print('ALERT')\n");
        write(&ws.path().join("alert.py/inner"), "oops\n");

        let report = materialize(src.path(), ws.path()).unwrap();
        assert!(report.is_clean());
        assert_eq!(read(&ws.path().join("alert.py")), "print('ALERT')\n");
    }

    #[test]
    fn repeated_materialize_is_stable() {
        let src = TempDir::new().unwrap();
        let ws = TempDir::new().unwrap();
        write(&src.path().join("a.txt"), "a\n");
        write(&ws.path().join("mine.txt"), "m\n");

        materialize(src.path(), ws.path()).unwrap();
        let second = materialize(src.path(), ws.path()).unwrap();
        assert_eq!(second.copied, 1);
        assert_eq!(second.removed, 1);
        assert_eq!(read(&ws.path().join("mine.txt")), "m\n");
    }

    #[test]
    fn skip_rules() {
        assert!(is_skipped_dir(".venv"));
        assert!(is_skipped_dir("__pycache__"));
        assert!(!is_skipped_dir("src"));
        assert!(is_skipped_file("x.pyo"));
        assert!(is_skipped_file(".env"));
        assert!(!is_skipped_file("validator.py"));
    }
}
