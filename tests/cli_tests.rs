use assert_cmd::cargo;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::tempdir;

struct Fixture {
    _td: tempfile::TempDir,
    base: PathBuf,
    cfg: PathBuf,
    root: PathBuf,
}

fn fixture() -> Fixture {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let cfg = base.join("config.xml");
    fs::write(&cfg, "<config>\n  <log_level>quiet</log_level>\n</config>\n").unwrap();
    let root = base.join("library");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), "A").unwrap();
    fs::write(root.join("b.txt"), "B").unwrap();
    fs::write(root.join("sub/c.txt"), "C").unwrap();
    Fixture { _td: td, base, cfg, root }
}

fn reshelve(cfg: &Path, args: &[&str]) -> Output {
    Command::new(cargo::cargo_bin!("reshelve"))
        .env("RESHELVE_CONFIG", cfg)
        .env("NO_COLOR", "1")
        .args(args)
        .output()
        .expect("spawn binary")
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn print_config_names_the_env_file() {
    let fx = fixture();
    let out = reshelve(&fx.cfg, &["--print-config"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("RESHELVE_CONFIG"), "{stdout}");
    assert!(stdout.contains(s(&fx.cfg)), "{stdout}");
}

#[test]
fn scan_lists_each_file_name() {
    let fx = fixture();
    let out = reshelve(&fx.cfg, &["--json", "scan", s(&fx.root)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let names: Vec<String> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn organize_then_restore_round_trips_the_tree() {
    let fx = fixture();
    let map = fx.base.join("map.json");
    fs::write(&map, r#"{"Docs": ["a.txt", "c.txt"], "Misc": ["b.txt"]}"#).unwrap();

    let out = reshelve(&fx.cfg, &["organize", s(&fx.root), "--mapping", s(&map)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(fs::read_to_string(fx.root.join("Docs/a.txt")).unwrap(), "A");
    assert_eq!(fs::read_to_string(fx.root.join("Docs/c.txt")).unwrap(), "C");
    assert_eq!(fs::read_to_string(fx.root.join("Misc/b.txt")).unwrap(), "B");
    assert!(!fx.root.join("sub").exists());

    let reports: Vec<_> = fs::read_dir(&fx.root)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("reorganization_report_") && n.ends_with(".txt"))
        .collect();
    assert_eq!(reports.len(), 1, "{reports:?}");

    let out = reshelve(&fx.cfg, &["restore", s(&fx.root)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(fs::read_to_string(fx.root.join("a.txt")).unwrap(), "A");
    assert_eq!(fs::read_to_string(fx.root.join("sub/c.txt")).unwrap(), "C");
    assert!(!fx.root.join("Docs").exists());
    assert!(!fx.root.join(&reports[0]).exists());
}

#[test]
fn confirm_discards_the_backup() {
    let fx = fixture();
    let map = fx.base.join("map.json");
    fs::write(&map, r#"{"Docs": ["a.txt"]}"#).unwrap();

    let out = reshelve(&fx.cfg, &["organize", s(&fx.root), "--mapping", s(&map), "--confirm"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = reshelve(&fx.cfg, &["--json", "backups", s(&fx.root)]);
    assert!(out.status.success());
    let backups: Vec<String> = serde_json::from_slice(&out.stdout).unwrap();
    assert!(backups.is_empty(), "{backups:?}");
}

#[test]
fn missing_names_exit_with_item_failure_code() {
    let fx = fixture();
    let map = fx.base.join("map.json");
    fs::write(&map, r#"{"Docs": ["a.txt", "ghost.pdf"]}"#).unwrap();

    let out = reshelve(&fx.cfg, &["organize", s(&fx.root), "--mapping", s(&map)]);
    assert_eq!(out.status.code(), Some(2));
    assert!(fx.root.join("Docs/a.txt").exists());
}

#[test]
fn duplicate_mapping_is_rejected_and_nothing_moves() {
    let fx = fixture();
    let map = fx.base.join("map.json");
    fs::write(&map, r#"{"Docs": ["a.txt"], "Misc": ["a.txt"]}"#).unwrap();

    let out = reshelve(&fx.cfg, &["organize", s(&fx.root), "--mapping", s(&map)]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("a.txt"), "{stderr}");
    assert!(stderr.contains("plan_duplicate"), "{stderr}");
    assert!(fx.root.join("a.txt").exists());
    assert!(!fx.root.join("Docs").exists());
}

#[test]
fn missing_root_is_an_error() {
    let fx = fixture();
    let out = reshelve(&fx.cfg, &["scan", s(&fx.base.join("nope"))]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn organize_requires_a_classifier_source() {
    let fx = fixture();
    let out = reshelve(&fx.cfg, &["organize", s(&fx.root)]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--mapping") || stderr.contains("error:"), "{stderr}");
}
