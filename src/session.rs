//! One reorganization session against one root.
//!
//! Opening a session takes the per-root lock, snapshots the tree and makes the
//! backup; nothing destructive can happen before those three succeed. The lock
//! is held until the session is dropped.
//!
//! Stage order for `organize`: validate plan, purge old reports, move, clean,
//! write report. The shutdown flag is only consulted between stages.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::backup::{BackupHandle, BackupStore};
use crate::classifier::Classifier;
use crate::cleaner::{self, CleanupEvent};
use crate::config::Config;
use crate::errors::SessionError;
use crate::executor::{self, MoveOutcome, MoveSummary};
use crate::fs_ops::{RootLock, try_acquire_root_lock};
use crate::journal::Journal;
use crate::plan::{RawMapping, ReorganizationPlan};
use crate::report::ReportWriter;
use crate::shutdown;
use crate::snapshot::Snapshot;

/// What one `organize` call did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub moves: MoveSummary,
    pub outcomes: Vec<MoveOutcome>,
    pub cleanup: Vec<CleanupEvent>,
    pub report: Option<PathBuf>,
    /// Set when the report could not be written; the moves still happened.
    pub report_error: Option<String>,
    /// Cleanup was skipped because an interrupt arrived after the moves.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.moves.not_found > 0
            || self.moves.failed > 0
            || self.cleanup.iter().any(CleanupEvent::is_error)
            || self.report_error.is_some()
    }
}

/// Names to hand to a classifier: every file name in the snapshot except
/// earlier reports.
pub fn classifier_input(snapshot: &Snapshot, reports: &ReportWriter) -> Vec<String> {
    snapshot
        .file_names()
        .into_iter()
        .filter(|n| !reports.is_report_name(n))
        .collect()
}

/// Canonical form of `root`, required to be an existing directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canon = dunce::canonicalize(root)
        .with_context(|| format!("resolve root directory '{}'", root.display()))?;
    if !canon.is_dir() {
        anyhow::bail!("root is not a directory: {}", canon.display());
    }
    Ok(canon)
}

#[derive(Debug)]
pub struct Session {
    snapshot: Snapshot,
    store: BackupStore,
    reports: ReportWriter,
    hidden_marker: String,
    backup: Option<BackupHandle>,
    // Last field: released after everything else is dropped.
    _lock: RootLock,
}

impl Session {
    /// Lock, snapshot and back up `root`.
    pub fn open(root: &Path, cfg: &Config) -> Result<Self> {
        let (lock, snapshot) = lock_and_snapshot(root)?;
        let mut session = Self::assemble(snapshot, cfg, lock);

        if shutdown::is_requested() {
            return Err(SessionError::Interrupted.into());
        }

        let handle = session
            .store
            .create_backup(&mut session.snapshot)
            .with_context(|| format!("back up '{}'", session.root().display()))?;
        session.backup = Some(handle);
        Ok(session)
    }

    /// Lock and snapshot `root`, re-attaching to its most recent existing
    /// backup instead of making a new one.
    pub fn attach_latest(root: &Path, cfg: &Config) -> Result<Self> {
        let (lock, snapshot) = lock_and_snapshot(root)?;
        let mut session = Self::assemble(snapshot, cfg, lock);

        let latest = session
            .store
            .list_backups(session.root())
            .with_context(|| format!("list backups of '{}'", session.root().display()))?
            .pop()
            .ok_or_else(|| SessionError::NoBackup(session.root().to_path_buf()))?;
        session.snapshot.backup_path = Some(latest.path().to_path_buf());
        info!(backup = %latest.path().display(), "attached to existing backup");
        session.backup = Some(latest);
        Ok(session)
    }

    fn assemble(snapshot: Snapshot, cfg: &Config, lock: RootLock) -> Self {
        Self {
            snapshot,
            store: BackupStore::new(cfg.backup_prefix.clone()),
            reports: ReportWriter::new(cfg.report_prefix.clone()),
            hidden_marker: cfg.hidden_marker.clone(),
            backup: None,
            _lock: lock,
        }
    }

    pub fn root(&self) -> &Path {
        self.snapshot.root_path()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn backup(&self) -> Option<&BackupHandle> {
        self.backup.as_ref()
    }

    pub fn classifier_input(&self) -> Vec<String> {
        classifier_input(&self.snapshot, &self.reports)
    }

    /// Ask `classifier` for a mapping of this session's files.
    pub fn classify(&self, classifier: &dyn Classifier) -> Result<Option<RawMapping>> {
        let names = self.classifier_input();
        info!(files = names.len(), "classifying");
        classifier.classify(&names).context("classifier failed")
    }

    /// Validate `raw` and run the reorganization pipeline.
    pub fn organize(&mut self, raw: RawMapping, journal: &mut Journal) -> Result<RunSummary> {
        let plan = ReorganizationPlan::validate(raw).context("category mapping rejected")?;
        self.require_backup()?;
        if shutdown::is_requested() {
            return Err(SessionError::Interrupted.into());
        }

        let root = self.root().to_path_buf();
        let purged = self.reports.purge_previous(&root);
        if purged > 0 {
            info!(purged, "previous reports removed");
        }

        let outcomes = executor::apply(&plan, &root, journal);
        let moves = MoveSummary::of(&outcomes);

        let interrupted = shutdown::is_requested();
        let cleanup = if interrupted {
            warn!("interrupt received; skipping cleanup");
            journal.record("interrupted: cleanup skipped");
            Vec::new()
        } else {
            cleaner::cleanup(&root, &self.hidden_marker, journal)
        };

        let (report, report_error) = match self.reports.write(&root, &plan, &outcomes, &cleanup, journal) {
            Ok(p) => (Some(p), None),
            Err(e) => {
                error!(root = %root.display(), error = %e, "report not written");
                (None, Some(e.to_string()))
            }
        };

        Ok(RunSummary {
            root,
            moves,
            outcomes,
            cleanup,
            report,
            report_error,
            interrupted,
        })
    }

    /// Put the tree back exactly as it was when the backup was made.
    /// Non-transactional: a failure part-way leaves the root incomplete, and
    /// the backup in place for another attempt.
    pub fn restore(&mut self) -> Result<()> {
        let handle = self.require_backup()?.clone();
        let root = self.root().to_path_buf();
        self.store
            .restore(&handle, &root)
            .with_context(|| format!("restore '{}' from '{}'", root.display(), handle.path().display()))?;
        self.snapshot
            .retake()
            .with_context(|| format!("re-read '{}' after restore", root.display()))?;
        self.snapshot.backup_path = Some(handle.path().to_path_buf());
        Ok(())
    }

    /// Accept the result and discard the backup. Returns whether it is gone.
    pub fn confirm(&mut self) -> bool {
        match self.backup.take() {
            Some(handle) => {
                let gone = self.store.cleanup(&handle);
                if gone {
                    self.snapshot.backup_path = None;
                } else {
                    self.backup = Some(handle);
                }
                gone
            }
            None => true,
        }
    }

    /// End the session. Returns the backup left on disk, if any.
    pub fn close(mut self, keep_backup: bool) -> Option<BackupHandle> {
        if !keep_backup {
            self.confirm();
        }
        self.backup.take()
    }

    fn require_backup(&self) -> Result<&BackupHandle, SessionError> {
        match &self.backup {
            Some(h) if h.exists() => Ok(h),
            _ => Err(SessionError::NoBackup(self.root().to_path_buf())),
        }
    }
}

fn lock_and_snapshot(root: &Path) -> Result<(RootLock, Snapshot)> {
    let root = canonical_root(root)?;
    let lock = try_acquire_root_lock(&root)
        .with_context(|| format!("lock '{}'", root.display()))?
        .ok_or_else(|| SessionError::RootBusy(root.clone()))?;
    let snapshot = Snapshot::take(&root).with_context(|| format!("snapshot '{}'", root.display()))?;
    Ok((lock, snapshot))
}
