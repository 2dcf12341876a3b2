//! Keyword file loading.
//!
//! One keyword per line:
//!
//! ```text
//! A: jump "jump up" hop
//! B: left: Turning left
//! ```
//!
//! The first field is the key, the second the space separated words, and the
//! optional third field the phrase spoken when the keyword fires. Double
//! quotes group text containing delimiters. Words are lowercased and stripped
//! of spaces and quotes.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::keyword::{Keyword, KeywordSet};

/// Name of the settings file when it shares the keyword directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

const TEMPLATE: &str = "A: Word1 Word2 Word3\nB: \"Word with spaces\" \"CapItaliZATion doesn't MaTter\": Spoken phrase\nC: ... 123\n";

/// Errors raised while parsing a keyword file.
#[derive(Error, Debug)]
pub enum KeywordFileError {
    /// I/O error when reading or writing files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A quote was opened but never closed
    #[error("Missing closing quote on line {line}")]
    UnterminatedQuote { line: usize },

    /// Wrong number of `:` separated fields
    #[error("Invalid format on line {line}, expected 'KEY: Word1 Word2 ...[: speech]'")]
    InvalidFormat { line: usize },

    /// The key field is blank
    #[error("Empty key on line {line}")]
    EmptyKey { line: usize },

    /// The words field has no words
    #[error("No words given for key '{key}' on line {line}")]
    NoWords { key: String, line: usize },

    /// The file held no keyword lines
    #[error("No keywords found in '{path}'")]
    Empty { path: String },
}

/// Split on `delimiter` outside double quotes, dropping empty segments.
///
/// Quotes are kept in the returned segments. Returns `None` when a quote is
/// left open.
fn split_quoted(input: &str, delimiter: char) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c == delimiter && !quoted => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if quoted {
        return None;
    }
    if !current.is_empty() {
        segments.push(current);
    }
    Some(segments)
}

fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_line(raw: &str, line: usize) -> Result<Keyword, KeywordFileError> {
    let fields = split_quoted(raw, ':').ok_or(KeywordFileError::UnterminatedQuote { line })?;
    if !(2..=3).contains(&fields.len()) {
        return Err(KeywordFileError::InvalidFormat { line });
    }

    let key = fields[0].replace('"', "").trim().to_string();
    if key.is_empty() {
        return Err(KeywordFileError::EmptyKey { line });
    }

    let words: Vec<String> = split_quoted(&fields[1], ' ')
        .ok_or(KeywordFileError::UnterminatedQuote { line })?
        .iter()
        .map(|w| normalize_word(w))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Err(KeywordFileError::NoWords { key, line });
    }

    let speech = fields
        .get(2)
        .map(|s| s.replace('"', "").trim().to_string())
        .unwrap_or_default();

    Ok(Keyword::new(key, speech, words))
}

/// Parse keyword file contents. Blank lines and `#` comments are skipped.
pub fn parse_keywords(text: &str) -> Result<Vec<Keyword>, KeywordFileError> {
    text.lines()
        .enumerate()
        .filter(|(_, raw)| {
            let trimmed = raw.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(index, raw)| parse_line(raw, index + 1))
        .collect()
}

/// Load and validate a keyword file.
pub fn load_keyword_file(path: &Path) -> Result<KeywordSet, KeywordFileError> {
    let text = fs::read_to_string(path)?;
    let keywords = parse_keywords(&text)?;
    if keywords.is_empty() {
        return Err(KeywordFileError::Empty {
            path: path.display().to_string(),
        });
    }

    tracing::info!("📄 Loaded {} keywords from {}", keywords.len(), path.display());
    for keyword in &keywords {
        tracing::debug!("  {}", keyword);
    }

    Ok(KeywordSet::new(keywords))
}

/// Write a new template file into `dir` and return its path.
pub fn create_template(dir: &Path) -> Result<PathBuf, KeywordFileError> {
    fs::create_dir_all(dir)?;

    let pattern = dir.join("NewTemplate*.txt");
    let existing = glob::glob(&pattern.to_string_lossy())
        .map(|paths| paths.filter_map(Result::ok).count())
        .unwrap_or(0);

    let name = if existing == 0 {
        "NewTemplate.txt".to_string()
    } else {
        format!("NewTemplate ({}).txt", existing)
    };
    let path = dir.join(name);
    fs::write(&path, TEMPLATE)?;

    tracing::info!("📝 Created keyword template: {}", path.display());
    Ok(path)
}

/// A file in the keyword directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFileEntry {
    pub name: String,
    pub is_settings: bool,
}

/// List the files in `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<KeywordFileEntry>, KeywordFileError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let is_settings = name.eq_ignore_ascii_case(SETTINGS_FILE_NAME);
        entries.push(KeywordFileEntry { name, is_settings });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
