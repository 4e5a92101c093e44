//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Global flags override values from the config file.
//! - --debug is a shorthand for --log-level debug.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use reshelve::classifier::{Classifier, ExternalCommand, MappingFile};
use reshelve::{Config, LogLevel};

/// Reorganize a directory into categories, with a full backup and one-step restore.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to read instead of $RESHELVE_CONFIG or the default location.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Also write logs to this file.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs (and command results) as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the backup directory name prefix.
    #[arg(long, global = true, value_name = "PREFIX")]
    pub backup_prefix: Option<String>,

    /// Override the report file name prefix.
    #[arg(long, global = true, value_name = "PREFIX")]
    pub report_prefix: Option<String>,

    /// Override the hidden-file marker used during cleanup.
    #[arg(long, global = true, value_name = "MARKER")]
    pub hidden_marker: Option<String>,

    /// Print the config file location used by reshelve and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the file names a classifier would be given. Changes nothing.
    Scan {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
    },
    /// Show where every classified file would move. Changes nothing.
    Preview {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
        #[command(flatten)]
        classifier: ClassifierArgs,
    },
    /// Back up, move files into categories, clean up, and write a report.
    Organize {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
        #[command(flatten)]
        classifier: ClassifierArgs,
        /// Discard the backup after a run without failures.
        #[arg(long)]
        confirm: bool,
    },
    /// Put the root back exactly as its latest backup recorded it.
    Restore {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
    },
    /// List backups of the root, oldest first.
    Backups {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
    },
    /// Delete the latest backup of the root (or all of them).
    Discard {
        #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
        root: Option<PathBuf>,
        #[arg(long)]
        all: bool,
    },
}

/// Where the category mapping comes from.
#[derive(ClapArgs, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ClassifierArgs {
    /// JSON file mapping category labels to arrays of file names.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub mapping: Option<PathBuf>,

    /// Program that reads file names on stdin and prints the mapping as JSON.
    #[arg(long = "classifier", value_name = "PROGRAM", value_hint = ValueHint::CommandName)]
    pub program: Option<String>,
}

impl ClassifierArgs {
    /// Arguments after `--` are passed to the classifier program.
    pub fn build(&self, program_args: &[String]) -> anyhow::Result<Box<dyn Classifier>> {
        match (&self.mapping, &self.program) {
            (Some(file), _) => Ok(Box::new(MappingFile::new(file))),
            (None, Some(program)) => Ok(Box::new(ExternalCommand::new(program.clone(), program_args.to_vec()))),
            (None, None) => anyhow::bail!("either --mapping or --classifier is required"),
        }
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    s.parse()
}

impl Command {
    pub fn root(&self) -> Option<&PathBuf> {
        match self {
            Command::Scan { root }
            | Command::Preview { root, .. }
            | Command::Organize { root, .. }
            | Command::Restore { root }
            | Command::Backups { root }
            | Command::Discard { root, .. } => root.as_ref(),
        }
    }
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(root) = self.command.as_ref().and_then(Command::root) {
            cfg.root = Some(root.clone());
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(f) = &self.log_file {
            cfg.log_file = Some(f.clone());
        }
        if let Some(p) = &self.backup_prefix {
            cfg.backup_prefix = p.clone();
        }
        if let Some(p) = &self.report_prefix {
            cfg.report_prefix = p.clone();
        }
        if let Some(m) = &self.hidden_marker {
            cfg.hidden_marker = m.clone();
        }
    }
}

/// Split argv at the first bare `--`: everything after it belongs to the classifier program.
pub fn parse() -> (Args, Vec<String>) {
    let argv: Vec<String> = std::env::args().collect();
    let (ours, theirs) = split_passthrough(argv);
    (Args::parse_from(ours), theirs)
}

fn split_passthrough(argv: Vec<String>) -> (Vec<String>, Vec<String>) {
    match argv.iter().position(|a| a == "--") {
        Some(i) => {
            let mut ours = argv;
            let theirs = ours.split_off(i + 1);
            ours.pop();
            (ours, theirs)
        }
        None => (argv, Vec::new()),
    }
}
