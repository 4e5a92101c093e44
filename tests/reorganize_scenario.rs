//! End-to-end behaviour of plan application and cleanup on a real tree.

mod common;

use common::{mapping, tree, write};
use reshelve::{CleanupEvent, Journal, MoveStatus, ReorganizationPlan, cleaner, executor};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn files_are_gathered_and_emptied_directory_removed() {
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "a.txt", "A");
    write(root, "b.txt", "B");
    write(root, "sub/c.txt", "C");

    let plan = ReorganizationPlan::validate(mapping(&[("Docs", &["a.txt", "c.txt"]), ("Misc", &["b.txt"])])).unwrap();
    let mut journal = Journal::new();
    let outcomes = executor::apply(&plan, root, &mut journal);

    assert!(outcomes.iter().all(|o| o.status == MoveStatus::Moved), "{outcomes:?}");
    let events = cleaner::cleanup(root, ".", &mut journal);
    assert_eq!(events, vec![CleanupEvent::EmptyDirRemoved { path: PathBuf::from("sub") }]);

    let after = tree(root);
    let expected: Vec<PathBuf> = ["Docs", "Docs/a.txt", "Docs/c.txt", "Misc", "Misc/b.txt"]
        .iter()
        .map(PathBuf::from)
        .collect();
    assert_eq!(after.keys().cloned().collect::<Vec<_>>(), expected);
    assert_eq!(after[&PathBuf::from("Docs/c.txt")].as_deref(), Some(&b"C"[..]));
    assert_eq!(journal.lines().len(), 4);
}

#[test]
fn second_application_moves_nothing() {
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "a.txt", "A");
    write(root, "nested/deep/b.txt", "B");

    let plan = ReorganizationPlan::validate(mapping(&[("Work/Reports", &["a.txt", "b.txt"])])).unwrap();
    executor::apply(&plan, root, &mut Journal::new());
    let before = tree(root);

    let again = executor::apply(&plan, root, &mut Journal::new());
    assert!(again.iter().all(|o| o.status == MoveStatus::AlreadyMoved), "{again:?}");
    assert_eq!(tree(root), before);
}

#[test]
fn missing_name_does_not_stop_the_batch() {
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "a.txt", "A");
    write(root, "b.txt", "B");

    let plan = ReorganizationPlan::validate(mapping(&[("Docs", &["a.txt", "ghost.pdf", "b.txt"])])).unwrap();
    let mut journal = Journal::new();
    let outcomes = executor::apply(&plan, root, &mut journal);

    let statuses: Vec<_> = outcomes.iter().map(|o| o.status.clone()).collect();
    assert_eq!(statuses, vec![MoveStatus::Moved, MoveStatus::SourceNotFound, MoveStatus::Moved]);
    assert_eq!(statuses.iter().filter(|s| s.is_failure()).count(), 1);
    assert!(root.join("Docs/b.txt").is_file());
    assert!(journal.lines().iter().any(|l| l.contains("ghost.pdf") && l.contains("Docs")));
}

#[test]
fn cleanup_of_a_tidy_tree_reports_nothing() {
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "Docs/a.txt", "A");
    write(root, "top.txt", "T");
    let before = tree(root);

    let events = cleaner::cleanup(root, ".", &mut Journal::new());
    assert!(events.is_empty(), "{events:?}");
    assert_eq!(tree(root), before);
}

#[test]
fn first_match_in_walk_order_wins_for_ambiguous_names() {
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "x/notes.md", "from x");
    write(root, "y/notes.md", "from y");

    let plan = ReorganizationPlan::validate(mapping(&[("Notes", &["notes.md"])])).unwrap();
    let outcomes = executor::apply(&plan, root, &mut Journal::new());

    assert_eq!(outcomes[0].status, MoveStatus::Moved);
    assert_eq!(std::fs::read_to_string(root.join("Notes/notes.md")).unwrap(), "from x");
    assert!(root.join("y/notes.md").exists());
}

#[cfg(unix)]
#[test]
fn cleanup_error_does_not_stop_the_walk() {
    use std::os::unix::fs::PermissionsExt;
    if common::running_as_root() {
        eprintln!("skipping: running as root");
        return;
    }
    let td = tempdir().unwrap();
    let root = td.path();
    write(root, "locked/.hidden", "h");
    write(root, "open/.hidden", "h");
    std::fs::create_dir_all(root.join("zempty")).unwrap();
    let locked = root.join("locked");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

    let events = cleaner::cleanup(root, ".", &mut Journal::new());
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(events.iter().filter(|e| e.is_error()).count(), 1, "{events:?}");
    assert!(matches!(&events[0], CleanupEvent::CleanupError { path, .. } if path == std::path::Path::new("locked/.hidden")));
    assert!(events.contains(&CleanupEvent::EmptyDirRemoved { path: "open".into() }));
    assert!(events.contains(&CleanupEvent::EmptyDirRemoved { path: "zempty".into() }));
    assert!(locked.join(".hidden").exists());
    assert!(!root.join("open").exists());
}
