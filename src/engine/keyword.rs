//! Keyword definitions consumed by the detection engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A configured trigger: an output action plus the words that fire it.
///
/// `words` are expected to be lowercased and whitespace-stripped by the
/// loader; the engine compares against them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    /// Key sent to the actuator
    pub key: String,
    /// Phrase spoken by the actuator
    pub speech: String,
    /// Alternative spellings, any of which completes the keyword
    pub words: Vec<String>,
}

impl Keyword {
    pub fn new(key: impl Into<String>, speech: impl Into<String>, words: Vec<String>) -> Self {
        Self {
            key: key.into(),
            speech: speech.into(),
            words,
        }
    }

    /// Length in characters of the longest alternative.
    pub fn char_len(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.chars().count())
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}: {}", self.key, self.words.join(", "))
    }
}

/// Immutable, ordered set of keywords for one configuration.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Arc<[Arc<Keyword>]>,
    longest: usize,
}

impl KeywordSet {
    pub fn new(keywords: Vec<Keyword>) -> Self {
        let longest = keywords.iter().map(Keyword::char_len).max().unwrap_or(0);
        Self {
            keywords: keywords.into_iter().map(Arc::new).collect(),
            longest,
        }
    }

    /// Longest keyword length in characters; this is the carried-old window cap.
    pub fn longest_len(&self) -> usize {
        self.longest
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Keyword>> {
        self.keywords.iter()
    }
}
