//! Core library for `reshelve`.
//!
//! Snapshot a directory tree, back it up next to itself, move its files into
//! category directories according to a validated plan, tidy up what is left,
//! and write an audit report. Any time later the backup can put the tree back
//! exactly as it was.

pub mod backup;
pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod errors;
pub mod executor;
pub mod fs_ops;
pub mod journal;
pub mod output;
pub mod plan;
pub mod platform;
pub mod report;
pub mod session;
pub mod shutdown;
pub mod snapshot;

pub use backup::{BackupHandle, BackupStore};
pub use classifier::{Classifier, ExternalCommand, MappingFile};
pub use cleaner::CleanupEvent;
pub use config::{
    CONFIG_ENV, Config, LoadResult, LogLevel, default_config_path, default_log_path,
    load_config_from_xml_path, load_or_init, path_has_symlink_ancestor,
};
pub use errors::{BackupError, PlanError, RestoreError, SessionError};
pub use executor::{MoveOutcome, MoveStatus, MoveSummary, PlannedMove};
pub use fs_ops::{RootLock, try_acquire_root_lock};
pub use journal::Journal;
pub use plan::{Category, RawMapping, ReorganizationPlan};
pub use report::ReportWriter;
pub use session::{RunSummary, Session, canonical_root, classifier_input};
pub use snapshot::{Entry, Snapshot};
