use anyhow::{Context, Result, bail};
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use super::config_temp_sibling;

/// Append-mode log file. A new file is created 0600; an existing one keeps
/// whatever mode it has.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let fresh = fs::symlink_metadata(path).is_err();
    let file = OpenOptions::new().create(true).append(true).mode(0o600).open(path)?;
    if fresh {
        // The umask may have narrowed the create mode further; pin it.
        file.set_permissions(Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

/// Write a brand-new config file: 0600 temp, fsync, rename, fsync the directory.
pub fn write_config_secure_new_0600(path: &Path, contents: &[u8]) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        bail!("config file already exists: {}", path.display());
    }
    let Some(dir) = path.parent() else {
        bail!("config path has no parent: {}", path.display());
    };
    fs::create_dir_all(dir).with_context(|| format!("create '{}'", dir.display()))?;

    let tmp = config_temp_sibling(path);
    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&tmp)
        .and_then(|mut f| f.write_all(contents).and_then(|_| f.sync_all()))
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("write config '{}'", path.display()));
    }

    File::open(dir)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("sync directory '{}'", dir.display()))
}

pub fn set_dir_mode_0700(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, Permissions::from_mode(0o700))
}

pub fn set_file_mode_0600(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, Permissions::from_mode(0o600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::CONFIG_TEMP_PREFIX;
    use tempfile::tempdir;

    fn mode(p: &Path) -> u32 {
        fs::metadata(p).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn existing_log_keeps_its_mode() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("reshelve.log");
        fs::write(&log, b"earlier run\n").unwrap();
        fs::set_permissions(&log, Permissions::from_mode(0o640)).unwrap();
        open_log_file_secure_append(&log).unwrap();
        assert_eq!(mode(&log), 0o640);
    }

    #[test]
    fn new_log_is_private() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs").join("reshelve.log");
        open_log_file_secure_append(&log).unwrap();
        assert_eq!(mode(&log), 0o600);
    }

    #[test]
    fn config_write_is_private_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("config.xml");
        write_config_secure_new_0600(&cfg, b"<config/>").unwrap();
        assert_eq!(fs::read(&cfg).unwrap(), b"<config/>");
        assert_eq!(mode(&cfg), 0o600);
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(CONFIG_TEMP_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn config_write_refuses_to_replace() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("config.xml");
        fs::write(&cfg, b"mine").unwrap();
        assert!(write_config_secure_new_0600(&cfg, b"<config/>").is_err());
        assert_eq!(fs::read(&cfg).unwrap(), b"mine");
    }
}
