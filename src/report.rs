//! Audit report written into the root after a run.
//!
//! One plain-text document per run: header, generation time, root path, the
//! plan as JSON, every move outcome, every cleanup event and the full journal.
//! Only the latest report is kept; earlier ones are purged before moves start
//! so they are never classified or moved.

use chrono::Local;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::backup::{TIMESTAMP_FORMAT, is_timestamp};
use crate::cleaner::CleanupEvent;
use crate::executor::{MoveOutcome, MoveStatus, MoveSummary};
use crate::fs_ops::io_error_with_help_io;
use crate::journal::Journal;
use crate::plan::ReorganizationPlan;

pub const DEFAULT_REPORT_PREFIX: &str = "reorganization_report_";
const REPORT_EXTENSION: &str = ".txt";

#[derive(Debug, Clone)]
pub struct ReportWriter {
    prefix: String,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_PREFIX)
    }
}

impl ReportWriter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>YYYYMMDD_HHMMSS.txt`, exactly as `write` names it. Anything
    /// else sharing the prefix belongs to the user.
    pub fn is_report_name(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(REPORT_EXTENSION))
            .is_some_and(is_timestamp)
    }

    /// Render and write the report at the top level of `root`.
    pub fn write(
        &self,
        root: &Path,
        plan: &ReorganizationPlan,
        outcomes: &[MoveOutcome],
        events: &[CleanupEvent],
        journal: &Journal,
    ) -> io::Result<PathBuf> {
        let now = Local::now();
        let path = root.join(format!(
            "{}{}{}",
            self.prefix,
            now.format(TIMESTAMP_FORMAT),
            REPORT_EXTENSION
        ));

        let body = render(root, &now.format("%Y-%m-%d %H:%M:%S").to_string(), plan, outcomes, events, journal);

        let mut file = fs::File::create(&path)
            .map_err(io_error_with_help_io("create report", &path))?;
        file.write_all(body.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(io_error_with_help_io("write report", &path))?;

        info!(report = %path.display(), bytes = body.len(), "report written");
        Ok(path)
    }

    /// Remove earlier reports at the top level of `root`. Returns how many were removed.
    pub fn purge_previous(&self, root: &Path) -> usize {
        let entries = match fs::read_dir(root) {
            Ok(it) => it,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot list root for old reports");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !self.is_report_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(report = %path.display(), "previous report removed");
                    removed += 1;
                }
                Err(e) => warn!(report = %path.display(), error = %e, "could not remove previous report"),
            }
        }
        removed
    }
}

fn render(
    root: &Path,
    generated: &str,
    plan: &ReorganizationPlan,
    outcomes: &[MoveOutcome],
    events: &[CleanupEvent],
    journal: &Journal,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Reorganization report");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out, "Generated: {generated}");
    let _ = writeln!(out, "Root: {}", root.display());
    let _ = writeln!(out);

    let _ = writeln!(out, "Plan:");
    let plan_json = serde_json::to_string_pretty(&plan.to_json()).unwrap_or_else(|_| "{}".into());
    let _ = writeln!(out, "{plan_json}");
    let _ = writeln!(out);

    let s = MoveSummary::of(outcomes);
    let _ = writeln!(out, "Outcomes:");
    for o in outcomes {
        let _ = writeln!(out, "  {}", outcome_line(o));
    }
    let _ = writeln!(
        out,
        "Summary: {} moved, {} already moved, {} not found, {} failed",
        s.moved, s.already_moved, s.not_found, s.failed
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Cleanup:");
    if events.is_empty() {
        let _ = writeln!(out, "  (nothing to clean)");
    }
    for e in events {
        let _ = writeln!(out, "  {}", event_line(e));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Log:");
    let _ = writeln!(out, "{}", journal.text());
    out
}

fn outcome_line(o: &MoveOutcome) -> String {
    let from = o
        .source
        .as_ref()
        .map(|p| format!(" (from {})", p.display()))
        .unwrap_or_default();
    match &o.status {
        MoveStatus::Moved => format!("[moved]          {} -> {}{}", o.file_name, o.category, from),
        MoveStatus::AlreadyMoved => format!("[already moved]  {} -> {}", o.file_name, o.category),
        MoveStatus::SourceNotFound => format!("[not found]      {} (wanted in {})", o.file_name, o.category),
        MoveStatus::MoveFailed(reason) => {
            format!("[failed]         {} -> {}{}: {}", o.file_name, o.category, from, reason)
        }
    }
}

fn event_line(e: &CleanupEvent) -> String {
    match e {
        CleanupEvent::HiddenFileDeleted { path } => format!("[hidden deleted] {}", path.display()),
        CleanupEvent::EmptyDirRemoved { path } => format!("[dir removed]    {}", path.display()),
        CleanupEvent::CleanupError { path, cause } => format!("[error]          {}: {}", path.display(), cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn sample_plan() -> ReorganizationPlan {
        ReorganizationPlan::validate(vec![
            ("Docs".into(), vec!["a.txt".into(), "c.txt".into()]),
            ("Misc".into(), vec!["gone.bin".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn report_contains_every_section() {
        let root = assert_fs::TempDir::new().unwrap();
        let mut journal = Journal::new();
        journal.record("moved 'a.txt' -> Docs");
        let outcomes = vec![
            MoveOutcome {
                file_name: "a.txt".into(),
                category: "Docs".into(),
                status: MoveStatus::Moved,
                source: Some(root.path().join("a.txt")),
                destination: Some(root.path().join("Docs/a.txt")),
            },
            MoveOutcome {
                file_name: "gone.bin".into(),
                category: "Misc".into(),
                status: MoveStatus::SourceNotFound,
                source: None,
                destination: None,
            },
        ];
        let events = vec![CleanupEvent::EmptyDirRemoved { path: PathBuf::from("sub") }];

        let writer = ReportWriter::default();
        let path = writer.write(root.path(), &sample_plan(), &outcomes, &events, &journal).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(writer.is_report_name(&name), "{name}");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"Docs\""));
        assert!(text.contains("[not found]      gone.bin (wanted in Misc)"));
        assert!(text.contains("[dir removed]    sub"));
        assert!(text.contains("Summary: 1 moved, 0 already moved, 1 not found, 0 failed"));
        assert!(text.trim_end().ends_with("moved 'a.txt' -> Docs"));
    }

    #[test]
    fn purge_only_touches_matching_top_level_files() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("reorganization_report_20240101_000000.txt").write_str("old").unwrap();
        root.child("reorganization_report_20240102_000000.txt").write_str("old").unwrap();
        root.child("reorganization_report_notes.md").write_str("keep").unwrap();
        root.child("reorganization_report_notes.txt").write_str("mine").unwrap();
        root.child("Docs/reorganization_report_20240101_000000.txt").write_str("nested").unwrap();

        assert_eq!(ReportWriter::default().purge_previous(root.path()), 2);
        root.child("reorganization_report_notes.md").assert("keep");
        root.child("reorganization_report_notes.txt").assert("mine");
        root.child("Docs/reorganization_report_20240101_000000.txt").assert("nested");
    }

    #[test]
    fn only_timestamped_names_are_reports() {
        let w = ReportWriter::default();
        assert!(w.is_report_name("reorganization_report_20240101_120000.txt"));
        assert!(!w.is_report_name("reorganization_report_.txt"));
        assert!(!w.is_report_name("reorganization_report_x.txt"));
        assert!(!w.is_report_name("reorganization_report_20240101_120000.txt.bak"));
        assert!(!w.is_report_name("reorganization_report_2024010_1120000.txt"));
    }
}
