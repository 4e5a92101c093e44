//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler, and
//! runs the selected subcommand.

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use reshelve::output as out;
use reshelve::{
    BackupError, BackupStore, CONFIG_ENV, Config, Journal, LoadResult, PlanError,
    ReorganizationPlan, ReportWriter, RestoreError, Session, SessionError, Snapshot,
    canonical_root, classifier_input, default_config_path, executor, load_or_init, shutdown,
    try_acquire_root_lock,
};

use crate::cli::{Args, ClassifierArgs, Command};
use crate::logging::init_tracing;

/// Exit code when the run finished but some items failed.
const EXIT_ITEM_FAILURES: u8 = 2;

/// Run the CLI application.
pub fn run(args: Args, passthrough: Vec<String>) -> Result<ExitCode> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location(args.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command.clone() else {
        bail!("no command given; run with --help to see the available commands");
    };

    let mut cfg = match load_or_init(args.config.as_deref())? {
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!("A template reshelve config was written to: {}", path.display()));
            out::print_info("Edit it to set a default root, prefixes or logging. Continuing with defaults.");
            Config::default()
        }
        other => other.into_config(),
    };
    args.apply_overrides(&mut cfg);
    cfg.validate().context("invalid configuration")?;

    let guard_opt = init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {}", e));
        e
    })?;

    // Guard is dropped on SIGINT to flush logs.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; stopping after the current step...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        }) {
            warn!(error = %e, "could not install interrupt handler");
        }
    }

    debug!(?command, "starting reshelve");

    let result = dispatch(&command, &cfg, args.json, &passthrough);
    if let Err(e) = &result {
        let msg = format!("{e:#}");
        match error_code(e) {
            Some(code) => error!(code, error = %msg, "command failed"),
            None => error!(error = %msg, "command failed"),
        }
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

/// Stable code of the typed error behind `e`, if there is one.
fn error_code(e: &anyhow::Error) -> Option<&'static str> {
    if let Some(se) = e.downcast_ref::<SessionError>() {
        return Some(se.code());
    }
    if let Some(be) = e.downcast_ref::<BackupError>() {
        return Some(be.code());
    }
    if let Some(re) = e.downcast_ref::<RestoreError>() {
        return Some(re.code());
    }
    e.downcast_ref::<PlanError>().map(PlanError::code)
}

fn dispatch(command: &Command, cfg: &Config, json: bool, passthrough: &[String]) -> Result<ExitCode> {
    let root = resolve_root(cfg)?;
    match command {
        Command::Scan { .. } => scan(&root, cfg, json),
        Command::Preview { classifier, .. } => preview(&root, cfg, classifier, passthrough, json),
        Command::Organize { classifier, confirm, .. } => {
            organize(&root, cfg, classifier, passthrough, *confirm, json)
        }
        Command::Restore { .. } => restore(&root, cfg),
        Command::Backups { .. } => list_backups(&root, cfg, json),
        Command::Discard { all, .. } => discard(&root, cfg, *all),
    }
}

fn resolve_root(cfg: &Config) -> Result<PathBuf> {
    let root = cfg
        .root
        .as_deref()
        .ok_or_else(|| anyhow!("no root directory given; pass ROOT or set <root> in the config file"))?;
    canonical_root(root)
}

fn print_config_location(explicit: Option<&Path>) {
    if let Some(p) = explicit {
        out::print_info(&format!("Using --config:\n  {}\n", p.display()));
        return;
    }
    if let Some(cfg_env) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            Path::new(&cfg_env).display()
        ));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default reshelve config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Any other command will create a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn scan(root: &Path, cfg: &Config, json: bool) -> Result<ExitCode> {
    let snapshot = Snapshot::take(root).with_context(|| format!("scan '{}'", root.display()))?;
    let names = classifier_input(&snapshot, &ReportWriter::new(cfg.report_prefix.clone()));
    if json {
        print_json(&names)?;
    } else {
        out::print_block(
            &format!("{} file name(s) under {}", names.len(), snapshot.root_path().display()),
            &names,
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn preview(
    root: &Path,
    cfg: &Config,
    classifier: &ClassifierArgs,
    passthrough: &[String],
    json: bool,
) -> Result<ExitCode> {
    let snapshot = Snapshot::take(root).with_context(|| format!("scan '{}'", root.display()))?;
    let names = classifier_input(&snapshot, &ReportWriter::new(cfg.report_prefix.clone()));
    let Some(raw) = classifier.build(passthrough)?.classify(&names)? else {
        out::print_warn("The classifier returned no categories; nothing would move.");
        return Ok(ExitCode::SUCCESS);
    };
    let plan = ReorganizationPlan::validate(raw).context("category mapping rejected")?;
    let planned = executor::preview(&plan, snapshot.root_path());

    if json {
        print_json(&planned)?;
        return Ok(ExitCode::SUCCESS);
    }
    let lines: Vec<String> = planned
        .iter()
        .map(|p| {
            let rel = |q: &Path| q.strip_prefix(snapshot.root_path()).unwrap_or(q).display().to_string();
            match (&p.source, p.already_in_place) {
                (_, true) => format!("{} -> {} (already in place)", p.file_name, p.category),
                (Some(src), false) => format!("{} -> {}", rel(src), rel(&p.destination)),
                (None, false) => format!("{} -> {} (not found)", p.file_name, p.category),
            }
        })
        .collect();
    out::print_block(&format!("{} planned move(s)", lines.len()), &lines);
    Ok(ExitCode::SUCCESS)
}

fn organize(
    root: &Path,
    cfg: &Config,
    classifier: &ClassifierArgs,
    passthrough: &[String],
    confirm: bool,
    json: bool,
) -> Result<ExitCode> {
    let classifier = classifier.build(passthrough)?;
    let mut session = Session::open(root, cfg)?;
    if let Some(b) = session.backup() {
        out::print_info(&format!("Backup created at {}", b.path().display()));
    }

    let raw = match session.classify(classifier.as_ref()) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            out::print_warn("The classifier returned no categories; nothing was moved.");
            session.close(false);
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            session.close(false);
            return Err(e);
        }
    };

    let mut journal = if json { Journal::new() } else { Journal::with_sink(out::print_user) };
    let summary = match session.organize(raw, &mut journal) {
        Ok(s) => s,
        Err(e) => {
            if let Some(kept) = session.close(true) {
                out::print_info(&format!("Backup kept at {}", kept.path().display()));
            }
            return Err(e);
        }
    };

    if json {
        print_json(&summary)?;
    } else {
        let m = &summary.moves;
        out::print_info(&format!(
            "{} moved, {} already moved, {} not found, {} failed; {} cleanup event(s)",
            m.moved,
            m.already_moved,
            m.not_found,
            m.failed,
            summary.cleanup.len()
        ));
        if let Some(r) = &summary.report {
            out::print_info(&format!("Report written to {}", r.display()));
        }
    }
    if let Some(e) = &summary.report_error {
        out::print_error(&format!("Report could not be written: {e}"));
    }
    if summary.interrupted {
        out::print_warn("Interrupted after moving files; cleanup was skipped.");
    }

    let clean_run = !summary.has_failures() && !summary.interrupted;
    let discard = (confirm || !cfg.keep_backup) && clean_run;
    if confirm && !clean_run {
        out::print_warn("Not discarding the backup because the run had failures.");
    }
    match session.close(!discard) {
        Some(kept) => out::print_info(&format!(
            "Backup kept at {}. Run `reshelve restore {}` to undo.",
            kept.path().display(),
            summary.root.display()
        )),
        None => out::print_success("Reorganization confirmed; backup discarded."),
    }

    Ok(if clean_run {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ITEM_FAILURES)
    })
}

fn restore(root: &Path, cfg: &Config) -> Result<ExitCode> {
    let mut session = Session::attach_latest(root, cfg)?;
    let backup = session
        .backup()
        .map(|b| b.path().display().to_string())
        .unwrap_or_default();
    out::print_info(&format!(
        "Restoring {} from {} (the current contents will be replaced)",
        session.root().display(),
        backup
    ));
    session.restore()?;
    out::print_success(&format!("Restored {} entries.", session.snapshot().len()));
    // The backup stays so the restore can be repeated; `discard` removes it.
    session.close(true);
    Ok(ExitCode::SUCCESS)
}

fn list_backups(root: &Path, cfg: &Config, json: bool) -> Result<ExitCode> {
    let store = BackupStore::new(cfg.backup_prefix.clone());
    let backups: Vec<String> = store
        .list_backups(root)
        .with_context(|| format!("list backups of '{}'", root.display()))?
        .iter()
        .map(|b| b.path().display().to_string())
        .collect();
    if json {
        print_json(&backups)?;
    } else if backups.is_empty() {
        out::print_info(&format!("No backups of {}", root.display()));
    } else {
        out::print_block(&format!("Backups of {}", root.display()), &backups);
    }
    Ok(ExitCode::SUCCESS)
}

fn discard(root: &Path, cfg: &Config, all: bool) -> Result<ExitCode> {
    let _lock = try_acquire_root_lock(root)
        .with_context(|| format!("lock '{}'", root.display()))?
        .ok_or_else(|| SessionError::RootBusy(root.to_path_buf()))?;
    let store = BackupStore::new(cfg.backup_prefix.clone());
    let mut backups = store
        .list_backups(root)
        .with_context(|| format!("list backups of '{}'", root.display()))?;
    if !all && backups.len() > 1 {
        backups.drain(..backups.len() - 1);
    }
    if backups.is_empty() {
        out::print_info(&format!("No backups of {}", root.display()));
        return Ok(ExitCode::SUCCESS);
    }

    let mut failed = 0;
    for b in &backups {
        if store.cleanup(b) {
            out::print_success(&format!("Discarded {}", b.path().display()));
        } else {
            out::print_error(&format!("Could not discard {}", b.path().display()));
            failed += 1;
        }
    }
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ITEM_FAILURES)
    })
}
