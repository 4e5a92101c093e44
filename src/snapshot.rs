//! Point-in-time record of a directory tree.
//!
//! A snapshot is a full walk of the root: every file and directory below it,
//! keyed by path relative to the root. It is never refreshed in place; taking
//! it again replaces the entry set wholesale.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::fs_ops::io_error_with_help_io;

/// One filesystem object seen during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub relative_path: PathBuf,
    pub is_directory: bool,
    pub absolute_path: PathBuf,
}

impl Entry {
    /// Base name of the entry.
    pub fn name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    root_path: PathBuf,
    taken_at: DateTime<Local>,
    entries: BTreeMap<PathBuf, Entry>,
    pub(crate) backup_path: Option<PathBuf>,
}

impl Snapshot {
    /// Walk `root` and record every entry beneath it.
    pub fn take(root: &Path) -> io::Result<Self> {
        let root_path = dunce::canonicalize(root).map_err(io_error_with_help_io("resolve root", root))?;
        if !root_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("root is not a directory: {}", root_path.display()),
            ));
        }
        let taken_at = Local::now();
        let entries = walk(&root_path)?;
        info!(root = %root_path.display(), entries = entries.len(), "snapshot taken");
        Ok(Self {
            root_path,
            taken_at,
            entries,
            backup_path: None,
        })
    }

    /// Re-walk the root, replacing the recorded entries and timestamp.
    /// Any backup association is kept.
    pub fn retake(&mut self) -> io::Result<()> {
        let entries = walk(&self.root_path)?;
        self.taken_at = Local::now();
        self.entries = entries;
        debug!(root = %self.root_path.display(), entries = self.entries.len(), "snapshot retaken");
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn taken_at(&self) -> DateTime<Local> {
        self.taken_at
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn get(&self, relative: impl AsRef<Path>) -> Option<&Entry> {
        self.entries.get(relative.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values().filter(|e| !e.is_directory)
    }

    pub fn directories(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values().filter(|e| e.is_directory)
    }

    pub fn relative_paths(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    /// Base names of every file, in walk order, duplicates collapsed.
    /// This is what a classifier sees.
    pub fn file_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.files()
            .map(Entry::name)
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

fn walk(root: &Path) -> io::Result<BTreeMap<PathBuf, Entry>> {
    let mut entries = BTreeMap::new();
    for item in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_error_with_help_io("walk", &path)(io::Error::from(e))
        })?;
        let relative_path = item
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
            .to_path_buf();
        entries.insert(
            relative_path.clone(),
            Entry {
                relative_path,
                is_directory: item.file_type().is_dir(),
                absolute_path: item.into_path(),
            },
        );
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn records_files_and_directories_relative_to_root() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();
        root.child("sub/c.txt").write_str("c").unwrap();

        let snap = Snapshot::take(root.path()).unwrap();
        assert_eq!(
            snap.relative_paths(),
            vec![PathBuf::from("a.txt"), PathBuf::from("sub"), Path::new("sub").join("c.txt")]
        );
        assert_eq!(snap.directories().count(), 1);
        assert!(snap.get("sub").unwrap().is_directory);
        let c = snap.get(Path::new("sub").join("c.txt")).unwrap();
        assert!(!c.is_directory);
        assert!(c.absolute_path.ends_with("sub/c.txt"));
        assert!(snap.backup_path().is_none());
    }

    #[test]
    fn file_names_collapse_duplicates_across_directories() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("x/notes.md").write_str("1").unwrap();
        root.child("y/notes.md").write_str("2").unwrap();
        root.child("z.md").write_str("3").unwrap();

        let snap = Snapshot::take(root.path()).unwrap();
        assert_eq!(snap.file_names(), vec!["notes.md".to_string(), "z.md".to_string()]);
    }

    #[test]
    fn retake_replaces_entries_wholesale() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("old.txt").write_str("o").unwrap();
        let mut snap = Snapshot::take(root.path()).unwrap();

        std::fs::remove_file(root.path().join("old.txt")).unwrap();
        root.child("new.txt").write_str("n").unwrap();
        snap.retake().unwrap();

        assert!(snap.get("old.txt").is_none());
        assert!(snap.get("new.txt").is_some());
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let err = Snapshot::take(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
