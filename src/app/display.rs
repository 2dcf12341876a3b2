//! Operator-facing output.

use std::sync::Arc;

use colored::{ColoredString, Colorize};
use parking_lot::Mutex;

use crate::io::logging::DISPLAY_TARGET;

/// One line of console output, with and without terminal styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub plain: String,
    pub styled: String,
}

impl DisplayLine {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            styled: text.clone(),
            plain: text,
        }
    }

    pub fn styled(plain: impl Into<String>, styled: ColoredString) -> Self {
        Self {
            plain: plain.into(),
            styled: styled.to_string(),
        }
    }

    pub fn blank() -> Self {
        Self::plain("")
    }
}

/// Where operator-facing lines go.
pub trait DisplaySink: Send + Sync {
    fn show(&self, line: &DisplayLine);
}

/// Prints styled lines to stdout and records the plain text in the log file.
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn show(&self, line: &DisplayLine) {
        println!("{}", line.styled);
        tracing::info!(target: DISPLAY_TARGET, "{}", line.plain);
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<DisplayLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text of every line shown so far.
    pub fn plain_lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|l| l.plain.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.plain.contains(needle))
    }
}

impl DisplaySink for MemorySink {
    fn show(&self, line: &DisplayLine) {
        self.lines.lock().push(line.clone());
    }
}

/// Convenience for multi-line plain text.
pub fn show_text(sink: &dyn DisplaySink, text: &str) {
    for line in text.lines() {
        sink.show(&DisplayLine::plain(line));
    }
}

/// Error responses are shown in red.
pub fn show_error(sink: &dyn DisplaySink, text: &str) {
    sink.show(&DisplayLine::styled(text, text.red()));
}
