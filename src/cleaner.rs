//! Post-move tidy-up: hidden litter and empty directories.
//!
//! Directories are visited deepest first so that a parent emptied by the
//! removal of its children is removed in the same pass. The root itself is
//! never touched. Deleting hidden files is irreversible; only run this once a
//! backup exists.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::fs_ops::describe_io_error;
use crate::journal::Journal;

pub const DEFAULT_HIDDEN_MARKER: &str = ".";

/// One deletion or removal attempt. Paths are relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CleanupEvent {
    HiddenFileDeleted { path: PathBuf },
    EmptyDirRemoved { path: PathBuf },
    CleanupError { path: PathBuf, cause: String },
}

impl CleanupEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, CleanupEvent::CleanupError { .. })
    }
}

/// Remove hidden files and empty directories below `root`.
pub fn cleanup(root: &Path, hidden_marker: &str, journal: &mut Journal) -> Vec<CleanupEvent> {
    let mut events = Vec::new();

    // Collect first: the walk must not observe its own removals.
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during cleanup");
                None
            }
        })
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        let rel = relative(root, &dir);

        if !hidden_marker.is_empty() {
            delete_hidden_children(root, &dir, hidden_marker, journal, &mut events);
        }

        let is_empty = match fs::read_dir(&dir) {
            Ok(mut it) => it.next().is_none(),
            Err(e) => {
                let cause = describe_io_error("read directory", &dir, &e);
                journal.record(format!("cleanup failed: {}: {}", rel.display(), cause));
                events.push(CleanupEvent::CleanupError { path: rel, cause });
                continue;
            }
        };

        if !is_empty {
            debug!(dir = %rel.display(), "directory not empty; kept");
            continue;
        }

        match fs::remove_dir(&dir) {
            Ok(()) => {
                journal.record(format!("removed empty directory: {}", rel.display()));
                events.push(CleanupEvent::EmptyDirRemoved { path: rel });
            }
            Err(e) => {
                let cause = describe_io_error("remove directory", &dir, &e);
                journal.record(format!("failed to remove directory {}: {}", rel.display(), cause));
                events.push(CleanupEvent::CleanupError { path: rel, cause });
            }
        }
    }

    let errors = events.iter().filter(|e| e.is_error()).count();
    info!(root = %root.display(), events = events.len(), errors, "cleanup finished");
    events
}

fn delete_hidden_children(
    root: &Path,
    dir: &Path,
    marker: &str,
    journal: &mut Journal,
    events: &mut Vec<CleanupEvent>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(e) => {
            let rel = relative(root, dir);
            let cause = describe_io_error("read directory", dir, &e);
            journal.record(format!("cleanup failed: {}: {}", rel.display(), cause));
            events.push(CleanupEvent::CleanupError { path: rel, cause });
            return;
        }
    };

    let mut hidden: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(marker))
        .map(|e| e.path())
        .collect();
    hidden.sort();

    for file in hidden {
        let rel = relative(root, &file);
        match fs::remove_file(&file) {
            Ok(()) => {
                journal.record(format!("deleted hidden file: {}", rel.display()));
                events.push(CleanupEvent::HiddenFileDeleted { path: rel });
            }
            Err(e) => {
                let cause = describe_io_error("delete hidden file", &file, &e);
                warn!(file = %rel.display(), error = %cause, "hidden file not deleted");
                journal.record(format!("failed to delete hidden file {}: {}", rel.display(), cause));
                events.push(CleanupEvent::CleanupError { path: rel, cause });
            }
        }
    }
}

fn relative(root: &Path, p: &Path) -> PathBuf {
    p.strip_prefix(root).unwrap_or(p).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn nested_empty_directories_go_in_one_pass() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a/b/c").create_dir_all().unwrap();
        root.child("a/b/.DS_Store").write_str("x").unwrap();

        let mut j = Journal::new();
        let events = cleanup(root.path(), ".", &mut j);

        assert_eq!(
            events,
            vec![
                CleanupEvent::EmptyDirRemoved { path: PathBuf::from("a/b/c") },
                CleanupEvent::HiddenFileDeleted { path: PathBuf::from("a/b/.DS_Store") },
                CleanupEvent::EmptyDirRemoved { path: PathBuf::from("a/b") },
                CleanupEvent::EmptyDirRemoved { path: PathBuf::from("a") },
            ]
        );
        assert!(!root.path().join("a").exists());
        assert_eq!(j.lines().len(), 4);
    }

    #[test]
    fn hidden_files_at_root_level_are_kept() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child(".keep").write_str("k").unwrap();
        let events = cleanup(root.path(), ".", &mut Journal::new());
        assert!(events.is_empty());
        assert!(root.path().join(".keep").exists());
    }

    #[test]
    fn directory_with_visible_content_survives_hidden_sweep() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("docs/.hidden").write_str("h").unwrap();
        root.child("docs/readme.md").write_str("r").unwrap();

        let events = cleanup(root.path(), ".", &mut Journal::new());
        assert_eq!(events, vec![CleanupEvent::HiddenFileDeleted { path: PathBuf::from("docs/.hidden") }]);
        root.child("docs/readme.md").assert("r");
    }
}
