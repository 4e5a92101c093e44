//! Platform-specific helpers for the config and log files.
//!
//! Unix gets 0600/0700 modes and a durable atomic write. Windows gets the same
//! temp-and-rename write with no permission management.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};
#[cfg(not(unix))]
pub use windows::{open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

pub(crate) const CONFIG_TEMP_PREFIX: &str = ".reshelve.config.tmp.";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden temp file beside `target`, unique per process, instant and call.
pub(crate) fn config_temp_sibling(target: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{CONFIG_TEMP_PREFIX}{}.{nanos}.{seq}", std::process::id()))
}
