//! Typed error definitions for reshelve.
//! Session-level failures (backup, restore, plan validation) get their own enums;
//! item-level failures live in outcomes/events and never surface as errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Backup copy failed: {0}")]
    CopyFailed(#[source] io::Error),

    #[error("Root has no parent directory to hold a backup: {0}")]
    InvalidRoot(PathBuf),
}

impl BackupError {
    /// Stable code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            BackupError::AlreadyExists(_) => "backup_exists",
            BackupError::CopyFailed(_) => "backup_copy_failed",
            BackupError::InvalidRoot(_) => "backup_invalid_root",
        }
    }
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Backup no longer exists: {0}")]
    BackupMissing(PathBuf),

    /// The root was left in an intermediate state.
    #[error("Restore stopped part-way; the root may be incomplete: {0}")]
    PartialFailure(String),
}

impl RestoreError {
    pub fn code(&self) -> &'static str {
        match self {
            RestoreError::BackupMissing(_) => "backup_missing",
            RestoreError::PartialFailure(_) => "restore_partial",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("File '{name}' is assigned to both '{first}' and '{second}'")]
    DuplicateAssignment {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid category label: '{0}'")]
    InvalidCategory(String),

    #[error("Invalid file name '{name}' in category '{category}'")]
    InvalidFileName { name: String, category: String },
}

impl PlanError {
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::DuplicateAssignment { .. } => "plan_duplicate",
            PlanError::InvalidCategory(_) => "plan_invalid_category",
            PlanError::InvalidFileName { .. } => "plan_invalid_name",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Another reorganization is already running on {0}")]
    RootBusy(PathBuf),

    #[error("No backup exists for {0}; refusing to modify the tree")]
    NoBackup(PathBuf),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::RootBusy(_) => "root_busy",
            SessionError::NoBackup(_) => "no_backup",
            SessionError::Interrupted => "interrupted",
        }
    }
}
