//! Keyword scanner: finds a keyword spelled one character per message.
//!
//! Scanning is pure and reentrant. Each invocation keeps its own progress
//! index and accumulator, so any number of scans may run in parallel over
//! the same candidate buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;

use super::keyword::Keyword;
use super::message::Message;

/// Which messages count as spelling input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Accept messages of any length, using their first character
    pub any_message: bool,
    /// Like `any_message`, and additionally accept a message whose whole text
    /// equals the target as an instant match
    pub full_messages: bool,
}

impl ScanOptions {
    fn accepts_multi_char(&self) -> bool {
        self.any_message || self.full_messages
    }
}

/// A successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHit {
    /// Messages whose characters spelled the target, in order
    pub messages: VecDeque<Message>,
    /// Timestamp of the completing message
    pub completed_at: DateTime<Utc>,
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Scan `candidates` in order for `target` spelled one character per message.
///
/// Any message that does not continue the spelling resets progress to the
/// start; there is no partial credit. The message that broke the sequence is
/// then tried as the first character of a new attempt rather than skipped, so
/// `a b a b c` spells `abc` with the last three messages and `c c a t` spells
/// `cat` starting at the second `c`.
pub fn scan(target: &str, candidates: &[Message], options: ScanOptions) -> Option<ScanHit> {
    let target: Vec<char> = target.chars().collect();
    if target.is_empty() || candidates.is_empty() {
        tracing::warn!(
            target_len = target.len(),
            candidates = candidates.len(),
            "⚠️ Scan called with empty input, reporting no match"
        );
        return None;
    }

    let mut index = 0;
    let mut accumulated = VecDeque::with_capacity(target.len());

    for message in candidates {
        if message.is_blank() {
            index = 0;
            accumulated.clear();
            continue;
        }

        if !options.accepts_multi_char() && !message.is_single_char() {
            index = 0;
            accumulated.clear();
            continue;
        }

        if options.full_messages && text_eq_ignore_case(&message.text, &target) {
            return Some(ScanHit {
                messages: VecDeque::from([message.clone()]),
                completed_at: message.timestamp,
            });
        }

        let Some(c) = message.first_char() else {
            continue;
        };
        if !chars_eq_ignore_case(c, target[index]) {
            index = 0;
            accumulated.clear();
            // the breaking message may itself start a new spelling
            if !chars_eq_ignore_case(c, target[0]) {
                continue;
            }
        }

        accumulated.push_back(message.clone());
        index += 1;
        if index == target.len() {
            return Some(ScanHit {
                messages: accumulated,
                completed_at: message.timestamp,
            });
        }
    }

    None
}

fn text_eq_ignore_case(text: &str, target: &[char]) -> bool {
    let mut text_chars = text.chars();
    for &t in target {
        match text_chars.next() {
            Some(c) if chars_eq_ignore_case(c, t) => {}
            _ => return false,
        }
    }
    text_chars.next().is_none()
}

/// Scan every alternative of `keyword` concurrently.
///
/// Reports the hit of the first alternative, in configured order, that
/// completed; `None` when no alternative did.
pub async fn scan_keyword(
    keyword: Arc<Keyword>,
    candidates: Arc<[Message]>,
    options: ScanOptions,
) -> Option<ScanHit> {
    if keyword.words.is_empty() || candidates.is_empty() {
        tracing::warn!(
            key = %keyword.key,
            words = keyword.words.len(),
            candidates = candidates.len(),
            "⚠️ Keyword scan called with empty input, reporting no match"
        );
        return None;
    }

    let scans = keyword.words.iter().cloned().map(|word| {
        let candidates = Arc::clone(&candidates);
        tokio::task::spawn_blocking(move || scan(&word, &candidates, options))
    });

    join_all(scans).await.into_iter().find_map(|result| match result {
        Ok(hit) => hit,
        Err(e) => {
            tracing::error!("❌ Alternative scan task failed for {}: {}", keyword.key, e);
            None
        }
    })
}
