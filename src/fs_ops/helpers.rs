//! I/O error enrichment.
//!
//! Wraps io::Error with the operation, the path and a short platform-aware hint
//! so item-level failures in the journal carry enough detail to reconcile by hand.
//!
//! Usage:
//!   // in functions returning anyhow::Result<_>
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create dir", dir))?;
//!
//!   // in functions returning io::Result<_>
//!   fs::rename(a, b).map_err(io_error_with_help_io("rename", a))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Hint for a raw OS error code, if we know one.
fn os_hint(code: i32) -> Option<&'static str> {
    #[cfg(unix)]
    {
        let hint = match code {
            libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
            libc::EXDEV => "cross-filesystem; rename not possible, a copy is required",
            libc::EBUSY => "resource busy; another process is using it",
            libc::ENOENT => "path not found; it may have been moved or deleted",
            libc::EEXIST => "already exists",
            libc::ENOTEMPTY => "directory not empty",
            libc::ENOSPC => "insufficient space on device",
            libc::EROFS => "read-only filesystem",
            libc::ELOOP => "too many symbolic link levels; possible symlink cycle",
            libc::ENAMETOOLONG => "file name or path too long",
            libc::EMFILE => "process file descriptor limit reached",
            libc::ENFILE => "system-wide file table overflow",
            _ => return None,
        };
        Some(hint)
    }
    #[cfg(windows)]
    {
        let hint = match code {
            5 => "access denied; check permissions",
            2 | 3 => "path not found; it may have been moved or deleted",
            17 => "not same device; a copy is required",
            32 => "sharing violation; the file is in use",
            80 | 183 => "already exists",
            112 => "insufficient disk space",
            145 => "directory not empty",
            206 => "file name or path too long",
            _ => return None,
        };
        Some(hint)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        None
    }
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found; it may have been moved or deleted"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Some("busy; retry later"),
        _ => None,
    }
}

/// "<op> '<path>': <error> (<hint>) [os code: N]"
pub(crate) fn describe_io_error(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    match e.raw_os_error() {
        Some(code) => {
            if let Some(h) = os_hint(code) {
                msg.push_str(&format!(" ({h})"));
            }
            msg.push_str(&format!(" [os code: {}]", code));
        }
        None => {
            if let Some(h) = kind_hint(e.kind()) {
                msg.push_str(&format!(" ({h})"));
            }
        }
    }
    msg
}

/// Adapter for anyhow::Result code.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(describe_io_error(op, path, &e))
}

/// Adapter for io::Result code. Keeps the original ErrorKind.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), describe_io_error(op, path, &e))
}
