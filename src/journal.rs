//! Operation journal.
//! Collects the human-readable log of one reorganization run. Each line is
//! forwarded to an optional presentation sink as it is recorded, mirrored to
//! tracing, and the full text ends up in the report.

use std::fmt;
use tracing::debug;

type Sink = Box<dyn FnMut(&str) + Send>;

#[derive(Default)]
pub struct Journal {
    lines: Vec<String>,
    sink: Option<Sink>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that also hands every line to `sink` (e.g. a terminal printer).
    pub fn with_sink(sink: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            lines: Vec::new(),
            sink: Some(Box::new(sink)),
        }
    }

    pub fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "reshelve::journal", "{}", line);
        if let Some(sink) = self.sink.as_mut() {
            sink(&line);
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Full log, one line per entry.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("lines", &self.lines.len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
