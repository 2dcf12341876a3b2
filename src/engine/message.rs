//! Chat message values shared by the transport and the detection engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a fetched chat record.
///
/// `Exit` and `Error` are control records: the transport uses them to signal
/// a finished stream or an unusable response through the same channel as
/// ordinary messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    SuperChat,
    Exit,
    Error,
    Unsupported,
}

impl MessageKind {
    /// Whether records of this kind carry chat text that can spell a keyword.
    pub fn is_chat(&self) -> bool {
        matches!(self, MessageKind::Text | MessageKind::SuperChat)
    }
}

/// A single immutable chat message.
///
/// Equality is structural over all four fields: two messages with the same
/// author, text, kind and publish time are treated as the same chat event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the author
    pub author: String,
    /// Displayed chat text
    pub text: String,
    /// Record kind
    pub kind: MessageKind,
    /// Publish time reported by the server
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        author: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            kind,
            timestamp,
        }
    }

    /// Convenience constructor for an ordinary text message.
    pub fn text(author: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(author, text, MessageKind::Text, timestamp)
    }

    /// Control record without author or text.
    pub fn control(kind: MessageKind) -> Self {
        Self::new("", "", kind, DateTime::<Utc>::MIN_UTC)
    }

    /// First character of the text, if any.
    pub fn first_char(&self) -> Option<char> {
        self.text.chars().next()
    }

    /// True when the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// True when the text is exactly one character long.
    pub fn is_single_char(&self) -> bool {
        let mut chars = self.text.chars();
        chars.next().is_some() && chars.next().is_none()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.author, self.text)
    }
}
