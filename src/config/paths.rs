//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log paths and detects symlinked ancestors for safety.

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file (or a directory holding `config.xml`).
pub const CONFIG_ENV: &str = "RESHELVE_CONFIG";

const APP_DIR: &str = "reshelve";
const CONFIG_FILE: &str = "config.xml";
const LOG_FILE: &str = "reshelve.log";

/// Config file location.
///
/// `$RESHELVE_CONFIG` wins when set. A relative value is resolved against the
/// current directory; a directory value means `<dir>/config.xml`. Otherwise the
/// platform config dir is used.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(raw) = env::var_os(CONFIG_ENV) {
        let mut p = PathBuf::from(raw);
        if p.as_os_str().is_empty() {
            return Err(anyhow!("{CONFIG_ENV} is set but empty"));
        }
        if p.is_relative() {
            p = env::current_dir()
                .context("resolve current directory for relative config path")?
                .join(p);
        }
        if p.is_dir() {
            p.push(CONFIG_FILE);
        }
        return Ok(p);
    }
    Ok(app_dir()?.join(CONFIG_FILE))
}

/// Default log file, next to the default config file.
pub fn default_log_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(LOG_FILE))
}

fn app_dir() -> Result<PathBuf> {
    if let Some(base) = config_dir() {
        return Ok(base.join(APP_DIR));
    }
    env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".config").join(APP_DIR))
        .ok_or_else(|| anyhow!("cannot determine a config directory (no platform config dir and HOME unset)"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.as_os_str().is_empty() {
            break;
        }
        match fs::symlink_metadata(anc) {
            Ok(meta) if meta.file_type().is_symlink() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        p = anc.parent();
    }
    Ok(false)
}
