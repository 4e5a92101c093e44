//! Metadata preservation for copied files.
//! - Copies the modification time and, on Unix, the permission bits.
//! - Best-effort: failures are logged and ignored; content is what restore guarantees.

use filetime::{FileTime, set_file_mtime};
use std::fs;
use std::path::Path;
use tracing::{trace, warn};

/// Preserve metadata on `dest` using already-fetched `src_meta`.
pub fn preserve_metadata(dest: &Path, src_meta: &fs::Metadata) {
    let mtime = FileTime::from_last_modification_time(src_meta);
    if let Err(e) = set_file_mtime(dest, mtime) {
        warn!(path = %dest.display(), error = %e, "failed to set mtime on copy");
    } else {
        trace!(path = %dest.display(), "set mtime on copy");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = src_meta.permissions().mode() & 0o7777;
        if let Err(e) = fs::set_permissions(dest, fs::Permissions::from_mode(mode)) {
            warn!(path = %dest.display(), mode = format!("{:o}", mode), error = %e, "failed to set permissions on copy");
        }
    }

    #[cfg(windows)]
    {
        if let Ok(meta) = fs::metadata(dest) {
            let mut perms = meta.permissions();
            perms.set_readonly(src_meta.permissions().readonly());
            if let Err(e) = fs::set_permissions(dest, perms) {
                warn!(path = %dest.display(), error = %e, "failed to set readonly attribute on copy");
            }
        }
    }
}
