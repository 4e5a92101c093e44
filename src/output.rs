//! User-facing console lines.
//!
//! Results and progress go to stdout, problems to stderr. Labels are colored
//! only when the stream they are written to is a terminal.

use owo_colors::{OwoColorize, Style};
use std::fmt::Display;

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

impl Stream {
    fn is_tty(self) -> bool {
        match self {
            Stream::Out => atty::is(atty::Stream::Stdout),
            Stream::Err => atty::is(atty::Stream::Stderr),
        }
    }

    fn write(self, line: impl Display) {
        match self {
            Stream::Out => println!("{line}"),
            Stream::Err => eprintln!("{line}"),
        }
    }
}

fn labelled(stream: Stream, label: &str, style: Style, msg: &str) {
    if stream.is_tty() {
        stream.write(format_args!("{} {msg}", label.style(style)));
    } else {
        stream.write(format_args!("{label} {msg}"));
    }
}

pub fn print_info(msg: &str) {
    labelled(Stream::Out, "info:", Style::new().cyan().bold(), msg);
}

pub fn print_success(msg: &str) {
    labelled(Stream::Out, "ok:", Style::new().green().bold(), msg);
}

pub fn print_warn(msg: &str) {
    labelled(Stream::Err, "warn:", Style::new().yellow().bold(), msg);
}

pub fn print_error(msg: &str) {
    labelled(Stream::Err, "error:", Style::new().red().bold(), msg);
}

/// Unprefixed stdout line. Journal lines go through here so they stay easy
/// to grep.
pub fn print_user(msg: &str) {
    Stream::Out.write(msg);
}

/// A heading followed by indented lines.
pub fn print_block(title: &str, lines: &[String]) {
    if Stream::Out.is_tty() {
        Stream::Out.write(title.bold());
    } else {
        Stream::Out.write(title);
    }
    for l in lines {
        Stream::Out.write(format_args!("  {l}"));
    }
}
