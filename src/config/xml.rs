//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a secure template at the default location on first run.
//!
//! Notes:
//! - This module only reads/writes the config file; value checks live in `validate`.
//! - Unknown XML fields are a hard error so typos surface instead of being ignored.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::paths::{CONFIG_ENV, default_config_path, default_log_path, path_has_symlink_ancestor};
use crate::backup::DEFAULT_BACKUP_PREFIX;
use crate::cleaner::DEFAULT_HIDDEN_MARKER;
use crate::config::types::{Config, LogLevel};
use crate::fs_ops::io_error_with_help;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};
use crate::report::DEFAULT_REPORT_PREFIX;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    root: Option<String>,
    backup_prefix: Option<String>,
    report_prefix: Option<String>,
    hidden_marker: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    keep_backup: Option<String>,
}

/// Outcome of locating and reading the config file.
#[derive(Debug)]
pub enum LoadResult {
    /// File found and parsed.
    Loaded(Config, PathBuf),
    /// No file at the default location; a template was written there.
    CreatedTemplate(PathBuf),
    /// No file and none created; built-in defaults apply.
    Defaults,
}

impl LoadResult {
    pub fn into_config(self) -> Config {
        match self {
            LoadResult::Loaded(cfg, _) => cfg,
            LoadResult::CreatedTemplate(_) | LoadResult::Defaults => Config::default(),
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str, field: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => bail!("{field}: expected true or false, got '{other}'"),
    }
}

// Map XmlConfig -> Config; absent or blank elements keep their defaults.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    cfg.root = non_empty(parsed.root).map(PathBuf::from);
    if let Some(p) = non_empty(parsed.backup_prefix) {
        cfg.backup_prefix = p;
    }
    if let Some(p) = non_empty(parsed.report_prefix) {
        cfg.report_prefix = p;
    }
    // The marker is compared verbatim; only an entirely blank value falls back.
    if let Some(m) = parsed.hidden_marker.filter(|m| !m.trim().is_empty()) {
        cfg.hidden_marker = m.trim().to_string();
    }
    if let Some(l) = non_empty(parsed.log_level) {
        cfg.log_level = l.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    cfg.log_file = non_empty(parsed.log_file).map(PathBuf::from);
    if let Some(k) = non_empty(parsed.keep_backup) {
        cfg.keep_backup = parse_bool(&k, "keep_backup")?;
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = if contents.trim().is_empty() {
        XmlConfig::default()
    } else {
        from_xml_str(&contents).with_context(|| format!("parse config xml '{}'", path.display()))?
    };
    let cfg = xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Locate and read the config file.
///
/// - `explicit` (the `--config` flag) must exist.
/// - `$RESHELVE_CONFIG` must exist when set.
/// - At the default location a missing file gets a template and defaults apply.
pub fn load_or_init(explicit: Option<&Path>) -> Result<LoadResult> {
    if let Some(p) = explicit {
        let cfg = load_config_from_xml_path(p)?;
        return Ok(LoadResult::Loaded(cfg, p.to_path_buf()));
    }

    let env_set = env::var_os(CONFIG_ENV).is_some();
    let path = default_config_path()?;
    if path.exists() {
        let cfg = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded(cfg, path));
    }
    if env_set {
        bail!("{CONFIG_ENV} points to a missing file: {}", path.display());
    }

    match create_template_config(&path) {
        Ok(()) => Ok(LoadResult::CreatedTemplate(path)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "template config not created");
            Ok(LoadResult::Defaults)
        }
    }
}

/// Create default template config file and parent directory (best-effort permissions).
/// Uses secure creation to avoid following attacker-controlled symlinks on Unix.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error_with_help("create config directory", parent))?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/path/to/reshelve.log".into());

    let content = format!(
        "<!--\n  reshelve configuration (XML)\n\n  root           -> directory to reorganize when none is given on the command line\n  backup_prefix  -> name prefix of backups created next to the root\n  report_prefix  -> name prefix of reports written into the root\n  hidden_marker  -> files starting with this are deleted during cleanup\n  log_level      -> quiet | normal | info | debug\n  log_file       -> path to log file (optional; stderr still used)\n  keep_backup    -> true keeps the backup after organize so it can be restored\n\n  CLI flags override XML values.\n-->\n<config>\n  <root></root>\n  <backup_prefix>{}</backup_prefix>\n  <report_prefix>{}</report_prefix>\n  <hidden_marker>{}</hidden_marker>\n  <log_level>normal</log_level>\n  <log_file>{}</log_file>\n  <keep_backup>true</keep_backup>\n</config>\n",
        DEFAULT_BACKUP_PREFIX, DEFAULT_REPORT_PREFIX, DEFAULT_HIDDEN_MARKER, suggested_log
    );

    // Atomic, secure write (create_new temp + rename), then tighten perms.
    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_round_trips_to_defaults() {
        let td = tempdir().unwrap();
        let path = td.path().join("nested").join("config.xml");
        create_template_config(&path).unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert_eq!(cfg.backup_prefix, DEFAULT_BACKUP_PREFIX);
        assert_eq!(cfg.report_prefix, DEFAULT_REPORT_PREFIX);
        assert_eq!(cfg.hidden_marker, DEFAULT_HIDDEN_MARKER);
        assert_eq!(cfg.root, None);
        assert!(cfg.keep_backup);
    }

    #[test]
    fn bad_bool_is_an_error() {
        let td = tempdir().unwrap();
        let path = td.path().join("config.xml");
        fs::write(&path, "<config><keep_backup>maybe</keep_backup></config>").unwrap();
        assert!(load_config_from_xml_path(&path).is_err());
    }
}
