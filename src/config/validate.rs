//! Config validation logic.
//! Checks name prefixes, the hidden-file marker, and the optional root and log file paths.

use anyhow::{Result, bail};
use std::path::{Component, Path};
use tracing::{debug, error};

use super::types::Config;

impl Config {
    /// Validate settings that would otherwise fail late or produce paths outside
    /// the intended directories.
    pub fn validate(&self) -> Result<()> {
        ensure_single_component(&self.backup_prefix, "backup_prefix")?;
        ensure_single_component(&self.report_prefix, "report_prefix")?;

        if self.hidden_marker.trim().is_empty() {
            error!("hidden_marker is empty");
            bail!("hidden_marker must not be empty (it would match every file)");
        }
        if self.hidden_marker.contains(['/', '\\']) {
            bail!("hidden_marker must not contain a path separator: '{}'", self.hidden_marker);
        }

        if let Some(root) = &self.root {
            ensure_dir_exists_and_is_dir(root, "root")?;
        }
        if let Some(log) = &self.log_file
            && log.is_dir()
        {
            bail!("log_file points to a directory: {}", log.display());
        }

        debug!(
            backup_prefix = %self.backup_prefix,
            report_prefix = %self.report_prefix,
            hidden_marker = %self.hidden_marker,
            "config validated"
        );
        Ok(())
    }
}

/// The prefix is glued to a timestamp to form one file name, so it must be a
/// plain, non-empty name fragment.
fn ensure_single_component(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{name} must not be empty");
    }
    if value.contains(['/', '\\']) {
        bail!("{name} must not contain a path separator: '{value}'");
    }
    let mut comps = Path::new(value).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("{name} is not a usable file name prefix: '{value}'"),
    }
}

/// Ensure path exists and is a directory; emit clear errors with path context.
fn ensure_dir_exists_and_is_dir(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        error!("{name} does not exist: {}", path.display());
        bail!("{name} does not exist: {}", path.display());
    }
    if !path.is_dir() {
        error!("{name} is not a directory: {}", path.display());
        bail!("{name} is not a directory: {}", path.display());
    }
    Ok(())
}
