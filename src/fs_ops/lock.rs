//! Advisory per-root lock.
//! Only one reorganization session may operate on a root at a time.
//!
//! Design:
//! - The lock file lives next to the root, not inside it: `<parent>/.<name>.reshelve.lock`.
//!   Snapshots, backups and restores never see it.
//! - `fs2` provides the exclusive lock (flock on Unix, LockFileEx on Windows).
//!
//! Notes:
//! - The lock is released when the RootLock guard is dropped.
//! - This module returns io::Result to keep low-level errors precise.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

use super::helpers::io_error_with_help_io;

const LOCK_SUFFIX: &str = ".reshelve.lock";

/// RAII guard held while a root is locked.
#[derive(Debug)]
pub struct RootLock {
    file: File,
    path: PathBuf,
}

impl RootLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        // Stale lock files are harmless, but don't leave litter next to the root.
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Sidecar lock path for `root`.
pub fn lock_file_path(root: &Path) -> PathBuf {
    let parent = root.parent().unwrap_or_else(|| Path::new("."));
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    parent.join(format!(".{name}{LOCK_SUFFIX}"))
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(io_error_with_help_io("open lock file", path))
}

/// Non-blocking acquire.
/// Returns Ok(None) if another session holds the lock.
pub fn try_acquire_root_lock(root: &Path) -> io::Result<Option<RootLock>> {
    let path = lock_file_path(root);
    let file = open_lock_file(&path)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            trace!(path = %path.display(), "try-lock success");
            Ok(Some(RootLock { file, path }))
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            trace!(path = %path.display(), "try-lock would block");
            Ok(None)
        }
        Err(e) => Err(io_error_with_help_io("lock", &path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_sits_beside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        std::fs::create_dir(&root).unwrap();
        let p = lock_file_path(&root);
        assert_eq!(p.parent(), Some(dir.path()));
        assert_eq!(p.file_name().unwrap(), ".library.reshelve.lock");
    }

    #[test]
    fn dropping_guard_removes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("r");
        std::fs::create_dir(&root).unwrap();
        let guard = try_acquire_root_lock(&root).unwrap().unwrap();
        let p = guard.path().to_path_buf();
        assert!(p.exists());
        drop(guard);
        assert!(!p.exists());
    }
}
