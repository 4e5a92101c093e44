//! Physical backups of a root, kept as timestamped siblings.
//!
//! Layout: `<parent>/<prefix><YYYYMMDD_HHMMSS>` next to `<parent>/<root>`,
//! plus a `<backup>.origin` file holding the canonical root it was taken
//! from. Sibling roots share the parent, so ownership is decided by the
//! origin file, never by the name alone.
//!
//! Restore is delete-then-copy with no staging area. If it fails part-way the
//! root is left as it was at the moment of failure; the backup itself is never
//! touched by a restore, so it can be retried.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::errors::{BackupError, RestoreError};
use crate::fs_ops::{copy_tree, describe_io_error};
use crate::snapshot::Snapshot;

/// Timestamp format shared by backups and reports.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const DEFAULT_BACKUP_PREFIX: &str = ".backup_";
const ORIGIN_SUFFIX: &str = ".origin";

/// Location of one backup on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    path: PathBuf,
}

impl BackupHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    prefix: String,
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_PREFIX)
    }
}

impl BackupStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Where a backup of `snapshot` would live.
    pub fn backup_path_for(&self, snapshot: &Snapshot) -> Result<PathBuf, BackupError> {
        let root = snapshot.root_path();
        let parent = root
            .parent()
            .ok_or_else(|| BackupError::InvalidRoot(root.to_path_buf()))?;
        let stamp = snapshot.taken_at().format(TIMESTAMP_FORMAT);
        Ok(parent.join(format!("{}{}", self.prefix, stamp)))
    }

    /// Copy the snapshot's root to a new sibling directory and attach it to the snapshot.
    /// A partial copy is removed before the error is returned.
    pub fn create_backup(&self, snapshot: &mut Snapshot) -> Result<BackupHandle, BackupError> {
        let dest = self.backup_path_for(snapshot)?;
        let root = snapshot.root_path().to_path_buf();
        let origin = origin_path(&dest);

        // create_dir (not create_dir_all) so a same-second collision is detected atomically.
        if let Err(e) = fs::create_dir(&dest) {
            if e.kind() == io::ErrorKind::AlreadyExists {
                warn!(backup = %dest.display(), "backup already exists");
                return Err(BackupError::AlreadyExists(dest));
            }
            return Err(BackupError::CopyFailed(io::Error::new(
                e.kind(),
                describe_io_error("create backup directory", &dest, &e),
            )));
        }

        let copied = write_origin(&origin, &root).and_then(|_| copy_tree(&root, &dest));
        match copied {
            Ok(stats) => {
                info!(root = %root.display(), backup = %dest.display(), files = stats.files, dirs = stats.dirs, "backup created");
                snapshot.backup_path = Some(dest.clone());
                Ok(BackupHandle { path: dest })
            }
            Err(e) => {
                error!(root = %root.display(), backup = %dest.display(), error = %e, "backup failed; removing partial copy");
                if let Err(rm) = fs::remove_dir_all(&dest) {
                    warn!(backup = %dest.display(), error = %rm, "could not remove partial backup");
                }
                remove_origin(&origin);
                Err(BackupError::CopyFailed(e))
            }
        }
    }

    /// Re-attach to a backup created earlier (e.g. by another process).
    pub fn open_backup(&self, path: &Path) -> Result<BackupHandle, RestoreError> {
        if !path.is_dir() {
            return Err(RestoreError::BackupMissing(path.to_path_buf()));
        }
        Ok(BackupHandle { path: path.to_path_buf() })
    }

    /// Backups taken from `root`, oldest first (names sort chronologically).
    /// Backups of sibling roots, and backups whose origin file is missing, are
    /// not listed.
    pub fn list_backups(&self, root: &Path) -> io::Result<Vec<BackupHandle>> {
        let root = canonical_or_same(root);
        let Some(parent) = root.parent() else {
            return Ok(Vec::new());
        };
        let mut found: Vec<PathBuf> = fs::read_dir(parent)?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| self.is_backup_name(&e.file_name().to_string_lossy()))
            .map(|e| e.path())
            .filter(|p| {
                let owned = origin_matches(&origin_path(p), &root);
                if !owned {
                    debug!(backup = %p.display(), root = %root.display(), "backup belongs to another root");
                }
                owned
            })
            .collect();
        found.sort();
        Ok(found.into_iter().map(|path| BackupHandle { path }).collect())
    }

    /// `<prefix>YYYYMMDD_HHMMSS`
    pub fn is_backup_name(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str()).is_some_and(is_timestamp)
    }

    /// Overwrite the contents of `root` with the backup.
    /// Phase 1 deletes everything under `root`; phase 2 copies the backup back.
    pub fn restore(&self, handle: &BackupHandle, root: &Path) -> Result<(), RestoreError> {
        if !handle.exists() {
            return Err(RestoreError::BackupMissing(handle.path.clone()));
        }
        info!(root = %root.display(), backup = %handle.path.display(), "restoring from backup");

        if !root.exists() {
            fs::create_dir_all(root).map_err(|e| {
                RestoreError::PartialFailure(describe_io_error("recreate root", root, &e))
            })?;
        }

        clear_directory(root).map_err(|e| {
            error!(root = %root.display(), error = %e, "restore failed while clearing root");
            RestoreError::PartialFailure(format!("clearing root: {e}"))
        })?;

        let stats = copy_tree(&handle.path, root).map_err(|e| {
            error!(root = %root.display(), error = %e, "restore failed while copying back");
            RestoreError::PartialFailure(format!("copying backup into root: {e}"))
        })?;

        info!(root = %root.display(), files = stats.files, dirs = stats.dirs, "restore complete");
        Ok(())
    }

    /// Delete the backup. Never fails loudly; returns whether it is gone.
    pub fn cleanup(&self, handle: &BackupHandle) -> bool {
        match fs::remove_dir_all(&handle.path) {
            Ok(()) => {
                remove_origin(&origin_path(&handle.path));
                info!(backup = %handle.path.display(), "backup discarded");
                true
            }
            Err(e) => {
                warn!(backup = %handle.path.display(), error = %e, "failed to discard backup");
                false
            }
        }
    }
}

/// `<backup>.origin`, beside the backup directory.
fn origin_path(backup: &Path) -> PathBuf {
    let mut name = backup.file_name().unwrap_or_default().to_os_string();
    name.push(ORIGIN_SUFFIX);
    backup.with_file_name(name)
}

fn canonical_or_same(root: &Path) -> PathBuf {
    dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

fn write_origin(origin: &Path, root: &Path) -> io::Result<()> {
    let root = canonical_or_same(root);
    fs::write(origin, root.as_os_str().as_encoded_bytes())
        .map_err(|e| io::Error::new(e.kind(), describe_io_error("record backup origin", origin, &e)))
}

fn origin_matches(origin: &Path, root: &Path) -> bool {
    fs::read(origin).is_ok_and(|recorded| recorded == root.as_os_str().as_encoded_bytes())
}

fn remove_origin(origin: &Path) {
    match fs::remove_file(origin) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(origin = %origin.display(), error = %e, "could not remove backup origin file"),
    }
}

/// True for text shaped like [`TIMESTAMP_FORMAT`] output: `YYYYMMDD_HHMMSS`.
pub(crate) fn is_timestamp(stamp: &str) -> bool {
    stamp.len() == 15
        && stamp.char_indices().all(|(i, c)| if i == 8 { c == '_' } else { c.is_ascii_digit() })
}

/// Remove every direct child of `dir` (directories recursively). Symlinks are
/// removed, never followed.
fn clear_directory(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ft = entry.file_type()?;
        let res = if ft.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        res.map_err(|e| io::Error::new(e.kind(), describe_io_error("remove", &path, &e)))?;
        debug!(path = %path.display(), "removed");
    }
    Ok(())
}
