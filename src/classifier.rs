//! Classifier boundary.
//!
//! A classifier turns the list of file names found in a root into a category
//! mapping. The engine only cares about the shape of the answer: a JSON object
//! whose values are arrays of file names. Key order is kept.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::plan::RawMapping;

/// Produces a raw mapping for a list of file names. `Ok(None)` means the
/// classifier had no answer; nothing will be moved.
pub trait Classifier {
    fn classify(&self, names: &[String]) -> Result<Option<RawMapping>>;
}

/// Parse classifier text into a mapping.
///
/// The text must be a single JSON document. Empty text, `null` and `{}` mean
/// "no result".
pub fn parse_mapping(text: &str) -> Result<Option<RawMapping>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str::<Value>(trimmed).context("classifier output is not JSON")?;
    mapping_from_value(value)
}

/// Validate the shape of a parsed JSON document.
pub fn mapping_from_value(value: Value) -> Result<Option<RawMapping>> {
    let obj = match value {
        Value::Null => return Ok(None),
        Value::Object(obj) => obj,
        other => bail!("classifier output must be a JSON object, got {}", kind_of(&other)),
    };
    if obj.is_empty() {
        return Ok(None);
    }

    let mut mapping = Vec::with_capacity(obj.len());
    for (label, names) in obj {
        let Value::Array(items) = names else {
            bail!("category '{label}' must map to an array of file names");
        };
        let names = items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(anyhow!("category '{label}' contains a non-string entry: {other}")),
            })
            .collect::<Result<Vec<_>>>()?;
        mapping.push((label, names));
    }
    Ok(Some(mapping))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads a prepared mapping from a JSON file. The names passed in are ignored.
#[derive(Debug, Clone)]
pub struct MappingFile {
    path: PathBuf,
}

impl MappingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Classifier for MappingFile {
    fn classify(&self, names: &[String]) -> Result<Option<RawMapping>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read mapping file '{}'", self.path.display()))?;
        let mapping = parse_mapping(&text)
            .with_context(|| format!("parse mapping file '{}'", self.path.display()))?;
        debug!(file = %self.path.display(), offered = names.len(), "mapping file loaded");
        Ok(mapping)
    }
}

/// Runs a program that reads file names (one per line) on stdin and prints a
/// mapping on stdout.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

impl Classifier for ExternalCommand {
    fn classify(&self, names: &[String]) -> Result<Option<RawMapping>> {
        info!(program = %self.program, names = names.len(), "running classifier command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn classifier '{}'", self.program))?;

        // Feed stdin from a separate thread so a chatty child cannot deadlock us.
        let input: String = names.iter().map(|n| format!("{n}\n")).collect();
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("classifier stdin unavailable"))?;
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for classifier '{}'", self.program))?;
        match writer.join() {
            Ok(Ok(())) => {}
            // The child may exit without reading everything; its stdout still counts.
            Ok(Err(e)) => warn!(error = %e, "classifier did not read all input"),
            Err(_) => warn!("classifier input writer panicked"),
        }

        if !output.status.success() {
            bail!("classifier '{}' exited with {}", self.program, output.status);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_mapping(&stdout).with_context(|| format!("parse output of classifier '{}'", self.program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn key_order_survives_parsing() {
        let m = parse_mapping(r#"{"Zeta": ["z.txt"], "Alpha": ["a.txt", "b.txt"]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(m[0].0, "Zeta");
        assert_eq!(m[1], ("Alpha".to_string(), vec!["a.txt".to_string(), "b.txt".to_string()]));
    }

    #[test]
    fn empty_answers_mean_no_result() {
        for text in ["", "  \n", "null", "{}"] {
            assert!(parse_mapping(text).unwrap().is_none(), "{text:?}");
        }
    }

    #[test]
    fn json_wrapped_in_prose_is_rejected() {
        let text = "Here you go:\n```json\n{\"Docs\": [\"a.txt\"]}\n```";
        assert!(parse_mapping(text).is_err());
    }

    #[test]
    fn wrong_shapes_are_errors() {
        assert!(parse_mapping("[1, 2]").is_err());
        assert!(parse_mapping(r#"{"Docs": "a.txt"}"#).is_err());
        assert!(parse_mapping(r#"{"Docs": ["a.txt", 3]}"#).is_err());
        assert!(parse_mapping("not json at all").is_err());
    }

    #[test]
    fn mapping_file_reads_json() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("map.json");
        f.write_str(r#"{"Docs": ["a.txt"]}"#).unwrap();
        let m = MappingFile::new(f.path()).classify(&["a.txt".into()]).unwrap().unwrap();
        assert_eq!(m.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn external_command_receives_names_on_stdin() {
        // Echo the first input line back as a one-file category.
        let cmd = ExternalCommand::new(
            "sh",
            vec![
                "-c".into(),
                r#"read first; printf '{"Picked": ["%s"]}' "$first""#.into(),
            ],
        );
        let m = cmd.classify(&["one.txt".into(), "two.txt".into()]).unwrap().unwrap();
        assert_eq!(m, vec![("Picked".to_string(), vec!["one.txt".to_string()])]);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_error() {
        let cmd = ExternalCommand::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert!(cmd.classify(&[]).is_err());
    }
}
