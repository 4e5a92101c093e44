//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::backup::DEFAULT_BACKUP_PREFIX;
use crate::cleaner::DEFAULT_HIDDEN_MARKER;
use crate::report::DEFAULT_REPORT_PREFIX;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory to reorganize when none is given on the command line
    pub root: Option<PathBuf>,
    /// Name prefix of backup directories created next to the root
    pub backup_prefix: String,
    /// Name prefix of report documents written into the root
    pub report_prefix: String,
    /// Files whose names start with this are deleted during cleanup
    pub hidden_marker: String,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Keep the backup after a successful organize (needed for a later restore)
    pub keep_backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            report_prefix: DEFAULT_REPORT_PREFIX.to_string(),
            hidden_marker: DEFAULT_HIDDEN_MARKER.to_string(),
            log_level: LogLevel::Normal,
            log_file: None,
            keep_backup: true,
        }
    }
}
