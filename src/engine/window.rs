//! Reconciles consecutive fetches into "new" and "carried old" messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::message::Message;

/// Split `current` against `previous`.
///
/// Returns `(new, old)`. `new` holds the messages of `current` that were not
/// in `previous`; `old` holds the ones present in both, as a multiset: a
/// message that appears twice in `current` but once in `previous` yields one
/// old and one new entry. `old` is ordered by timestamp and truncated to the
/// last `cap` messages.
pub fn assemble(previous: &[Message], current: &[Message], cap: usize) -> (Vec<Message>, Vec<Message>) {
    let mut seen: HashMap<&Message, usize> = HashMap::with_capacity(previous.len());
    for message in previous {
        *seen.entry(message).or_insert(0) += 1;
    }

    let mut new = Vec::new();
    let mut old = Vec::new();
    for message in current {
        match seen.get_mut(message) {
            Some(count) if *count > 0 => {
                *count -= 1;
                old.push(message.clone());
            }
            _ => new.push(message.clone()),
        }
    }

    new.sort_by_key(|m| m.timestamp);
    (new, retain_tail(old, cap))
}

/// Sort by timestamp (stable) and keep only the last `cap` messages.
pub fn retain_tail(mut messages: Vec<Message>, cap: usize) -> Vec<Message> {
    messages.sort_by_key(|m| m.timestamp);
    if messages.len() > cap {
        messages.drain(..messages.len() - cap);
    }
    messages
}

/// Candidate buffer presented to scanners: old first, then new.
pub fn candidates(old: &[Message], new: &[Message]) -> Vec<Message> {
    let mut buffer = Vec::with_capacity(old.len() + new.len());
    buffer.extend_from_slice(old);
    buffer.extend_from_slice(new);
    buffer
}

/// Carried-old window cap shared between the poller and the keyword reload path.
#[derive(Debug, Clone, Default)]
pub struct WindowCap(Arc<AtomicUsize>);

impl WindowCap {
    pub fn new(cap: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(cap)))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, cap: usize) {
        self.0.store(cap, Ordering::Release);
    }
}
