//! Plan application.
//!
//! Best-effort by design: every listed name gets exactly one outcome, and a
//! failure on one file never stops the rest. There is no rollback here; the
//! only way back to a known state is restoring the backup.
//!
//! Name lookup is by base name. When the same name exists in several
//! directories the first one in walk order (depth-first, sorted by file name)
//! wins.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::fs_ops::{copy_file_no_clobber, describe_io_error, is_cross_device, rename_no_clobber};
use crate::journal::Journal;
use crate::plan::{Category, ReorganizationPlan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum MoveStatus {
    Moved,
    AlreadyMoved,
    SourceNotFound,
    MoveFailed(String),
}

impl MoveStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, MoveStatus::SourceNotFound | MoveStatus::MoveFailed(_))
    }
}

/// Result for one (file name, category) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub file_name: String,
    pub category: String,
    pub status: MoveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

/// Tally of a batch of outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveSummary {
    pub moved: usize,
    pub already_moved: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl MoveSummary {
    pub fn of(outcomes: &[MoveOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut s, o| {
            match o.status {
                MoveStatus::Moved => s.moved += 1,
                MoveStatus::AlreadyMoved => s.already_moved += 1,
                MoveStatus::SourceNotFound => s.not_found += 1,
                MoveStatus::MoveFailed(_) => s.failed += 1,
            }
            s
        })
    }
}

/// What `preview` predicts for one name. Nothing is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub file_name: String,
    pub category: String,
    pub source: Option<PathBuf>,
    pub destination: PathBuf,
    pub already_in_place: bool,
}

/// Base name -> candidate paths in walk order, built once per application.
struct NameIndex {
    by_name: HashMap<String, Vec<PathBuf>>,
}

impl NameIndex {
    fn build(root: &Path) -> Self {
        let mut by_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry while indexing");
                    None
                }
            })
            .filter(|e| !e.file_type().is_dir())
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            by_name.entry(name).or_default().push(entry.into_path());
        }
        debug!(root = %root.display(), names = by_name.len(), "name index built");
        Self { by_name }
    }

    /// First candidate still present on disk.
    fn first(&self, name: &str) -> Option<&Path> {
        self.by_name
            .get(name)?
            .iter()
            .map(PathBuf::as_path)
            .find(|p| fs::symlink_metadata(p).is_ok())
    }

    fn contains(&self, name: &str, path: &Path) -> bool {
        self.by_name
            .get(name)
            .is_some_and(|v| v.iter().any(|p| p == path))
    }
}

/// Apply `plan` to the tree at `root`. Returns one outcome per listed name, in plan order.
pub fn apply(plan: &ReorganizationPlan, root: &Path, journal: &mut Journal) -> Vec<MoveOutcome> {
    let index = NameIndex::build(root);
    let mut moved: HashSet<String> = HashSet::new();
    let mut outcomes = Vec::with_capacity(plan.file_count());

    info!(root = %root.display(), categories = plan.len(), files = plan.file_count(), "applying plan");

    for category in plan.categories() {
        let dest_dir = category.dir_under(root);
        if let Err(e) = fs::create_dir_all(&dest_dir) {
            let reason = describe_io_error("create category directory", &dest_dir, &e);
            warn!(category = category.label(), error = %reason, "category directory unavailable");
            for name in category.files() {
                journal.record(format!("failed to move '{}' -> {}: {}", name, category.label(), reason));
                outcomes.push(outcome(name, category, MoveStatus::MoveFailed(reason.clone()), None, None));
            }
            continue;
        }

        for name in category.files() {
            let result = apply_one(name, category, &dest_dir, &index, &mut moved);
            journal.record(journal_line(&result));
            outcomes.push(result);
        }
    }

    let summary = MoveSummary::of(&outcomes);
    info!(
        moved = summary.moved,
        already_moved = summary.already_moved,
        not_found = summary.not_found,
        failed = summary.failed,
        "plan applied"
    );
    outcomes
}

fn apply_one(
    name: &str,
    category: &Category,
    dest_dir: &Path,
    index: &NameIndex,
    moved: &mut HashSet<String>,
) -> MoveOutcome {
    let dest = dest_dir.join(name);

    if moved.contains(name) {
        return outcome(name, category, MoveStatus::AlreadyMoved, None, Some(dest));
    }

    if index.contains(name, &dest) && dest.exists() {
        return outcome(name, category, MoveStatus::AlreadyMoved, Some(dest.clone()), Some(dest));
    }

    let Some(src) = index.first(name).map(Path::to_path_buf) else {
        return outcome(name, category, MoveStatus::SourceNotFound, None, Some(dest));
    };

    match move_file(&src, &dest) {
        Ok(()) => {
            moved.insert(name.to_string());
            debug!(src = %src.display(), dest = %dest.display(), "moved");
            outcome(name, category, MoveStatus::Moved, Some(src), Some(dest))
        }
        Err(e) => {
            let reason = describe_io_error("move", &src, &e);
            warn!(file = name, category = category.label(), error = %reason, "move failed");
            outcome(name, category, MoveStatus::MoveFailed(reason), Some(src), Some(dest))
        }
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    match rename_no_clobber(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), "cross-device rename; copying instead");
            copy_file_no_clobber(src, dest)?;
            fs::remove_file(src)
        }
        Err(e) => Err(e),
    }
}

fn outcome(
    name: &str,
    category: &Category,
    status: MoveStatus,
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
) -> MoveOutcome {
    MoveOutcome {
        file_name: name.to_string(),
        category: category.label().to_string(),
        status,
        source,
        destination,
    }
}

fn journal_line(o: &MoveOutcome) -> String {
    match &o.status {
        MoveStatus::Moved => format!("moved '{}' -> {}", o.file_name, o.category),
        MoveStatus::AlreadyMoved => format!(
            "warning: '{}' was already moved; skipping assignment to {}",
            o.file_name, o.category
        ),
        MoveStatus::SourceNotFound => {
            format!("not found: '{}' (wanted in {})", o.file_name, o.category)
        }
        MoveStatus::MoveFailed(reason) => {
            format!("failed to move '{}' -> {}: {}", o.file_name, o.category, reason)
        }
    }
}

/// Resolve every name against the current tree without moving anything.
pub fn preview(plan: &ReorganizationPlan, root: &Path) -> Vec<PlannedMove> {
    let index = NameIndex::build(root);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut planned = Vec::with_capacity(plan.file_count());
    for category in plan.categories() {
        let dest_dir = category.dir_under(root);
        for name in category.files() {
            let destination = dest_dir.join(name);
            let already_in_place = !seen.insert(name.as_str()) || index.contains(name, &destination);
            planned.push(PlannedMove {
                file_name: name.clone(),
                category: category.label().to_string(),
                source: index.first(name).map(Path::to_path_buf),
                destination,
                already_in_place,
            });
        }
    }
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn plan(pairs: &[(&str, &[&str])]) -> ReorganizationPlan {
        ReorganizationPlan::validate(
            pairs
                .iter()
                .map(|(l, n)| (l.to_string(), n.iter().map(|s| s.to_string()).collect()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn moves_files_into_nested_category() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("deep/q1.pdf").write_str("q1").unwrap();

        let mut j = Journal::new();
        let out = apply(&plan(&[("Work/Reports", &["q1.pdf"])]), root.path(), &mut j);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, MoveStatus::Moved);
        root.child("Work/Reports/q1.pdf").assert("q1");
        assert!(!root.path().join("deep/q1.pdf").exists());
        assert_eq!(j.lines(), ["moved 'q1.pdf' -> Work/Reports"]);
    }

    #[test]
    fn repeated_name_in_category_reports_already_moved() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();

        let out = apply(&plan(&[("Docs", &["a.txt", "a.txt"])]), root.path(), &mut Journal::new());
        let statuses: Vec<_> = out.iter().map(|o| o.status.clone()).collect();
        assert_eq!(statuses, vec![MoveStatus::Moved, MoveStatus::AlreadyMoved]);
    }

    #[test]
    fn file_already_at_destination_is_left_alone() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("x/a.txt").write_str("from x").unwrap();
        root.child("y/a.txt").write_str("from y").unwrap();

        let out = apply(&plan(&[("y", &["a.txt"])]), root.path(), &mut Journal::new());
        assert_eq!(out[0].status, MoveStatus::AlreadyMoved);
        root.child("x/a.txt").assert("from x");
        root.child("y/a.txt").assert("from y");
    }

    #[test]
    fn occupied_destination_is_a_failure_not_an_overwrite() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();
        root.child("Docs/a.txt").create_dir_all().unwrap();

        let out = apply(&plan(&[("Docs", &["a.txt"])]), root.path(), &mut Journal::new());
        assert!(matches!(out[0].status, MoveStatus::MoveFailed(_)));
        root.child("a.txt").assert("a");
    }

    #[test]
    fn preview_touches_nothing() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();

        let p = preview(&plan(&[("Docs", &["a.txt", "ghost.txt"])]), root.path());
        assert_eq!(p.len(), 2);
        assert!(p[0].source.is_some());
        assert!(!p[0].already_in_place);
        assert!(p[1].source.is_none());
        assert!(root.path().join("a.txt").exists());
        assert!(!root.path().join("Docs").exists());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_category_fails_every_name_but_not_the_batch() {
        use std::os::unix::fs::PermissionsExt;
        if unsafe { libc::geteuid() } == 0 {
            eprintln!("skipping: running as root");
            return;
        }
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();
        root.child("b.txt").write_str("b").unwrap();
        let locked = root.child("Locked");
        locked.create_dir_all().unwrap();
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let out = apply(
            &plan(&[("Locked/Inner", &["a.txt"]), ("Open", &["b.txt"])]),
            root.path(),
            &mut Journal::new(),
        );
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(out[0].status, MoveStatus::MoveFailed(_)));
        assert_eq!(out[1].status, MoveStatus::Moved);
        assert!(root.path().join("a.txt").exists());
    }
}
