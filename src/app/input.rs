//! Line-based operator input.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Source of operator input lines.
#[async_trait]
pub trait InputSource: Send {
    /// Next line, or `None` once the input is closed.
    ///
    /// Must be safe to cancel: a line is never lost when the returned future
    /// is dropped before completion.
    async fn next_line(&mut self) -> Option<String>;
}

/// Reads lines from stdin.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("❌ Failed to read input: {}", e);
                None
            }
        }
    }
}

/// Replays a fixed list of lines, then reports the input as closed.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}
