//! Rename helper.
//! - Refuses to replace an existing destination (the caller decides what a collision means).
//! - On Unix, best-effort fsync of the destination directory after rename.

use std::fs;
use std::io;
use std::path::Path;

use super::util::fsync_dir;

/// Rename `src` -> `dst` without clobbering. Returns the raw io::Error so callers
/// can detect cross-device failures and fall back to a copy.
pub fn rename_no_clobber(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination already exists: {}", dst.display()),
        ));
    }

    fs::rename(src, dst)?;

    if let Some(parent) = dst.parent() {
        // Ignore fsync errors to avoid turning a successful rename into a failure.
        let _ = fsync_dir(parent);
    }
    Ok(())
}
