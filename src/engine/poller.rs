//! Poller: adaptive-delay fetch loop and fetch-to-fetch reconciliation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::message::{Message, MessageKind};
use super::window::{self, WindowCap};
use crate::api::ChatTransport;

/// New-message counts this close to the page size may have skipped messages.
pub const SKIP_WARNING_MARGIN: usize = 5;

/// Messages of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBatch {
    /// Everything usable returned this round
    pub all: Vec<Message>,
    /// Messages absent from the previous round
    pub new: Vec<Message>,
    /// Messages present in both rounds, capped to the window size
    pub old: Vec<Message>,
    /// The new-message count came within the margin of the page size
    pub possibly_truncated: bool,
}

/// Outcome of a single [`Poller::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Batch(FetchedBatch),
    /// The stream signalled it has ended
    StreamEnded,
    /// Fetch fault or unusable response
    Failed(String),
    /// Cancelled during the delay or the fetch
    Cancelled,
}

impl PollOutcome {
    /// 0 for a batch, 1 for a finished stream, -1 for a failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PollOutcome::Batch(_) | PollOutcome::Cancelled => 0,
            PollOutcome::StreamEnded => 1,
            PollOutcome::Failed(_) => -1,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            PollOutcome::Batch(batch) => format!("fetched {} messages", batch.all.len()),
            PollOutcome::StreamEnded => "stream ended".to_string(),
            PollOutcome::Failed(reason) => reason.clone(),
            PollOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Lower bound for the delay between fetches
    pub desired_delay: Duration,
    /// Page size requested from the transport
    pub max_results: usize,
}

pub struct Poller {
    transport: Arc<dyn ChatTransport>,
    config: PollerConfig,
    current_delay: Duration,
    previous: Vec<Message>,
    window_cap: WindowCap,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        config: PollerConfig,
        window_cap: WindowCap,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            current_delay: config.desired_delay,
            config,
            previous: Vec::new(),
            window_cap,
            cancel,
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Messages of the most recent successful poll.
    pub fn previous(&self) -> &[Message] {
        &self.previous
    }

    /// Wait the current delay, fetch, and reconcile against the previous fetch.
    ///
    /// The previous raw set and the delay only change when a batch is returned.
    pub async fn poll(&mut self) -> PollOutcome {
        tokio::select! {
            _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(self.current_delay) => {}
        }

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
            fetched = self.transport.fetch() => fetched,
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("❌ Fetch from {} failed: {}", self.transport.name(), e);
                return PollOutcome::Failed(e.to_string());
            }
        };

        if raw.messages.iter().any(|m| m.kind == MessageKind::Exit) {
            tracing::info!("🔴 Stream ended");
            return PollOutcome::StreamEnded;
        }
        if raw.messages.iter().any(|m| m.kind == MessageKind::Error) {
            return PollOutcome::Failed("error record received from transport".to_string());
        }
        if raw.messages.is_empty() {
            return PollOutcome::Failed("no usable messages were fetched".to_string());
        }

        let current: Vec<Message> = raw
            .messages
            .into_iter()
            .filter(|m| m.kind.is_chat())
            .collect();
        let (new, old) = window::assemble(&self.previous, &current, self.window_cap.get());

        let possibly_truncated =
            new.len() >= self.config.max_results.saturating_sub(SKIP_WARNING_MARGIN);
        if possibly_truncated {
            tracing::warn!(
                "⚠️ Possible missed messages! {} new messages, page size is {}",
                new.len(),
                self.config.max_results
            );
        }
        if !new.is_empty() {
            tracing::debug!(
                new = new.len(),
                total = current.len(),
                old = old.len(),
                "📨 Messages sampled"
            );
        }

        self.current_delay = self.config.desired_delay.max(raw.suggested_delay);
        self.previous = current.clone();

        PollOutcome::Batch(FetchedBatch {
            all: current,
            new,
            old,
            possibly_truncated,
        })
    }

    /// Poll until a terminal outcome, forwarding every batch to `batches`.
    pub async fn run(mut self, batches: mpsc::Sender<FetchedBatch>) -> PollOutcome {
        tracing::info!("▶️ Polling {} every {:?}+", self.transport.name(), self.config.desired_delay);
        loop {
            match self.poll().await {
                PollOutcome::Batch(batch) => {
                    if batches.send(batch).await.is_err() {
                        tracing::debug!("Batch receiver closed, stopping poller");
                        return PollOutcome::Cancelled;
                    }
                }
                terminal => return terminal,
            }
        }
    }
}
