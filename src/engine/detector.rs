//! Detection engine: fans one window out to every keyword and collects matches.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::keyword::KeywordSet;
use super::message::Message;
use super::poller::FetchedBatch;
use super::scanner::{scan_keyword, ScanHit, ScanOptions};
use super::window;

/// A keyword spelled out in chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub key: String,
    pub speech: String,
    /// Messages that spelled the keyword, in order
    pub messages: VecDeque<Message>,
    /// Timestamp of the completing message
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The cycle ran to completion; matches are in keyword configuration order
    Completed(Vec<Match>),
    /// Cancellation was observed; no state was changed
    Cancelled,
    /// A scan task failed; no state was changed
    Aborted(String),
}

impl Detection {
    pub fn matches(&self) -> &[Match] {
        match self {
            Detection::Completed(matches) => matches,
            _ => &[],
        }
    }
}

/// Owns one keyword configuration and the low-water mark.
#[derive(Debug)]
pub struct DetectionEngine {
    keywords: KeywordSet,
    options: ScanOptions,
    low_water_mark: DateTime<Utc>,
    cancel: CancellationToken,
}

impl DetectionEngine {
    pub fn new(keywords: KeywordSet, options: ScanOptions, cancel: CancellationToken) -> Self {
        tracing::debug!(
            keywords = keywords.len(),
            window_cap = keywords.longest_len(),
            "🔧 Detection engine created"
        );
        Self {
            keywords,
            options,
            low_water_mark: DateTime::<Utc>::MIN_UTC,
            cancel,
        }
    }

    /// Start from an existing low-water mark, e.g. when replacing the keyword set.
    pub fn with_low_water_mark(mut self, mark: DateTime<Utc>) -> Self {
        self.low_water_mark = mark;
        self
    }

    pub fn low_water_mark(&self) -> DateTime<Utc> {
        self.low_water_mark
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Carried-old messages capped to the longest keyword, followed by the
    /// batch's new messages. Anything at or before the low-water mark is
    /// dropped from both.
    pub fn build_candidates(&self, batch: &FetchedBatch) -> Vec<Message> {
        let old = window::retain_tail(batch.old.clone(), self.keywords.longest_len());
        let old: Vec<Message> = old
            .into_iter()
            .filter(|m| m.timestamp > self.low_water_mark)
            .collect();
        let new: Vec<Message> = batch
            .new
            .iter()
            .filter(|m| m.timestamp > self.low_water_mark)
            .cloned()
            .collect();
        window::candidates(&old, &new)
    }

    /// Run one detection cycle over `batch`.
    ///
    /// Either the whole cycle is applied (matches returned, low-water mark
    /// advanced) or nothing is.
    pub async fn detect(&mut self, batch: &FetchedBatch) -> Detection {
        if self.cancel.is_cancelled() {
            return Detection::Cancelled;
        }

        let candidates: Arc<[Message]> = self.build_candidates(batch).into();
        if candidates.is_empty() || self.keywords.is_empty() {
            tracing::debug!(
                candidates = candidates.len(),
                keywords = self.keywords.len(),
                "💤 Nothing to scan this cycle"
            );
            return Detection::Completed(Vec::new());
        }

        let mut scans = JoinSet::new();
        for (index, keyword) in self.keywords.iter().enumerate() {
            let keyword = Arc::clone(keyword);
            let candidates = Arc::clone(&candidates);
            let options = self.options;
            scans.spawn(async move { (index, scan_keyword(keyword, candidates, options).await) });
        }

        let collected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("🛑 Detection cycle cancelled while scanning");
                return Detection::Cancelled;
            }
            collected = collect_scans(&mut scans) => collected,
        };

        let mut results = match collected {
            Ok(results) => results,
            Err(reason) => {
                tracing::error!("❌ Detection cycle aborted: {}", reason);
                return Detection::Aborted(reason);
            }
        };

        if self.cancel.is_cancelled() {
            return Detection::Cancelled;
        }

        results.sort_by_key(|(index, _)| *index);
        let keywords: Vec<_> = self.keywords.iter().collect();
        let mut matches = Vec::new();
        for (index, hit) in results {
            let Some(hit) = hit else { continue };
            let keyword = keywords[index];
            if hit.completed_at > self.low_water_mark {
                self.low_water_mark = hit.completed_at;
            }
            matches.push(Match {
                key: keyword.key.clone(),
                speech: keyword.speech.clone(),
                messages: hit.messages,
                completed_at: hit.completed_at,
            });
        }

        if !matches.is_empty() {
            tracing::info!(
                matches = matches.len(),
                low_water_mark = %self.low_water_mark,
                "🎯 Keywords detected"
            );
        }

        Detection::Completed(matches)
    }
}

async fn collect_scans(
    scans: &mut JoinSet<(usize, Option<ScanHit>)>,
) -> Result<Vec<(usize, Option<ScanHit>)>, String> {
    let mut results = Vec::with_capacity(scans.len());
    while let Some(joined) = scans.join_next().await {
        results.push(joined.map_err(|e| format!("keyword scan task failed: {}", e))?);
    }
    Ok(results)
}
