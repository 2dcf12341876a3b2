//! Detection worker: runs detection cycles in arrival order and handles
//! keyword reloads between cycles.

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::detector::{Detection, DetectionEngine, Match};
use super::keyword::KeywordSet;
use super::poller::FetchedBatch;
use super::window::WindowCap;
use crate::{ChatKeysError, ChatKeysResult};

enum WorkerCommand {
    Reload {
        keywords: KeywordSet,
        cancel: CancellationToken,
        done: oneshot::Sender<()>,
    },
}

/// Control handle for a running detection worker.
pub struct DetectionHandle {
    commands: mpsc::Sender<WorkerCommand>,
    current_cancel: Mutex<CancellationToken>,
    // held from send to ack so tokens are swapped in command order
    reload_lock: tokio::sync::Mutex<()>,
    window_cap: WindowCap,
}

/// Spawn the worker that owns `engine`.
///
/// Each completed cycle's matches are sent to `matches` as one batch, in the
/// order the cycles completed. The worker stops when `batches` closes.
pub fn spawn_detection(
    engine: DetectionEngine,
    batches: mpsc::Receiver<FetchedBatch>,
    matches: mpsc::Sender<Vec<Match>>,
    window_cap: WindowCap,
) -> (DetectionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(4);
    window_cap.set(engine.keywords().longest_len());

    let handle = DetectionHandle {
        commands: commands_tx,
        current_cancel: Mutex::new(engine.cancel_token().clone()),
        reload_lock: tokio::sync::Mutex::new(()),
        window_cap,
    };
    let task = tokio::spawn(run_worker(engine, batches, commands_rx, matches));

    (handle, task)
}

impl DetectionHandle {
    /// Replace the keyword set.
    ///
    /// Cancels the cycle in flight, waits for the worker to reach a cycle
    /// boundary, then installs the new set with a fresh cancellation token.
    /// The low-water mark carries over. Concurrent reloads run one at a time.
    pub async fn reload(&self, keywords: KeywordSet) -> ChatKeysResult<()> {
        let _reloading = self.reload_lock.lock().await;
        let cancel = CancellationToken::new();
        let longest = keywords.longest_len();
        let (done_tx, done_rx) = oneshot::channel();

        self.commands
            .send(WorkerCommand::Reload {
                keywords,
                cancel: cancel.clone(),
                done: done_tx,
            })
            .await
            .map_err(|_| ChatKeysError::config("detection worker is not running"))?;

        let previous = std::mem::replace(&mut *self.current_cancel.lock(), cancel);
        previous.cancel();

        done_rx
            .await
            .map_err(|_| ChatKeysError::config("detection worker stopped during reload"))?;
        self.window_cap.set(longest);

        tracing::info!("🔄 Keyword set reloaded (window cap {})", longest);
        Ok(())
    }

    /// Cancel the cycle in flight and every cycle after it.
    pub fn cancel(&self) {
        self.current_cancel.lock().cancel();
    }

    /// Token of the engine currently installed.
    pub fn cancel_token(&self) -> CancellationToken {
        self.current_cancel.lock().clone()
    }
}

async fn run_worker(
    mut engine: DetectionEngine,
    mut batches: mpsc::Receiver<FetchedBatch>,
    mut commands: mpsc::Receiver<WorkerCommand>,
    matches: mpsc::Sender<Vec<Match>>,
) {
    tracing::debug!("🧵 Detection worker started");
    loop {
        tokio::select! {
            biased;
            Some(command) = commands.recv() => match command {
                WorkerCommand::Reload { keywords, cancel, done } => {
                    let mark = engine.low_water_mark();
                    let options = engine.options();
                    engine = DetectionEngine::new(keywords, options, cancel).with_low_water_mark(mark);
                    let _ = done.send(());
                }
            },
            batch = batches.recv() => {
                let Some(batch) = batch else { break };
                match engine.detect(&batch).await {
                    Detection::Completed(found) if !found.is_empty() => {
                        if matches.send(found).await.is_err() {
                            tracing::debug!("Match receiver closed, stopping detection worker");
                            break;
                        }
                    }
                    Detection::Completed(_) => {}
                    Detection::Cancelled => tracing::debug!("🛑 Detection cycle discarded"),
                    Detection::Aborted(reason) => tracing::warn!("⚠️ Detection cycle aborted: {}", reason),
                }
            }
        }
    }
    tracing::debug!("🧵 Detection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::keyword::Keyword;
    use crate::engine::message::Message;
    use crate::engine::scanner::ScanOptions;
    use chrono::{TimeZone, Utc};

    fn msg(text: &str, secs: i64) -> Message {
        Message::text("viewer", text, Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn new_batch(new: Vec<Message>) -> FetchedBatch {
        FetchedBatch {
            all: new.clone(),
            new,
            old: vec![],
            possibly_truncated: false,
        }
    }

    fn keywords(key: &str, word: &str) -> KeywordSet {
        KeywordSet::new(vec![Keyword::new(key, "", vec![word.to_string()])])
    }

    #[tokio::test]
    async fn test_worker_forwards_matches_in_order() {
        let engine = DetectionEngine::new(
            keywords("A", "hi"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (match_tx, mut match_rx) = mpsc::channel(4);
        let cap = WindowCap::default();
        let (_handle, task) = spawn_detection(engine, batch_rx, match_tx, cap.clone());
        assert_eq!(cap.get(), 2);

        batch_tx.send(new_batch(vec![msg("h", 1), msg("i", 2)])).await.unwrap();
        batch_tx.send(new_batch(vec![msg("x", 3)])).await.unwrap();
        batch_tx.send(new_batch(vec![msg("h", 4), msg("i", 5)])).await.unwrap();
        drop(batch_tx);

        let first = match_rx.recv().await.unwrap();
        let second = match_rx.recv().await.unwrap();
        assert_eq!(first[0].completed_at, Utc.timestamp_opt(2, 0).unwrap());
        assert_eq!(second[0].completed_at, Utc.timestamp_opt(5, 0).unwrap());
        task.await.unwrap();
        assert!(match_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_reload_swaps_keywords_and_updates_cap() {
        let engine = DetectionEngine::new(
            keywords("A", "hi"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (match_tx, mut match_rx) = mpsc::channel(4);
        let cap = WindowCap::default();
        let (handle, task) = spawn_detection(engine, batch_rx, match_tx, cap.clone());

        handle.reload(keywords("B", "left")).await.unwrap();
        assert_eq!(cap.get(), 4);

        batch_tx
            .send(new_batch(vec![msg("h", 1), msg("i", 2), msg("l", 3), msg("e", 4), msg("f", 5), msg("t", 6)]))
            .await
            .unwrap();
        drop(batch_tx);

        let found = match_rx.recv().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "B");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_after_worker_stopped_fails() {
        let engine = DetectionEngine::new(
            keywords("A", "hi"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(1);
        let (match_tx, _match_rx) = mpsc::channel(1);
        let (handle, task) = spawn_detection(engine, batch_rx, match_tx, WindowCap::default());
        drop(batch_tx);
        task.await.unwrap();

        assert!(handle.reload(keywords("B", "go")).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_reloads_leave_last_set_live() {
        let engine = DetectionEngine::new(
            keywords("A", "hi"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (match_tx, mut match_rx) = mpsc::channel(4);
        let (handle, task) = spawn_detection(engine, batch_rx, match_tx, WindowCap::default());

        let (first, second) = tokio::join!(
            handle.reload(keywords("B", "go")),
            handle.reload(keywords("C", "up"))
        );
        first.unwrap();
        second.unwrap();

        batch_tx.send(new_batch(vec![msg("u", 1), msg("p", 2)])).await.unwrap();
        drop(batch_tx);

        let found = match_rx.recv().await.unwrap();
        assert_eq!(found[0].key, "C");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_discards_cycle_in_flight() {
        let engine = DetectionEngine::new(
            keywords("A", "cat"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        // capacity 1: the second send returns only once the worker holds the first batch
        let (batch_tx, batch_rx) = mpsc::channel(1);
        let (match_tx, mut match_rx) = mpsc::channel(4);
        let (handle, task) = spawn_detection(engine, batch_rx, match_tx, WindowCap::default());

        let mut busy: Vec<Message> = (0..50_000).map(|i| msg("x", i)).collect();
        busy.extend([msg("c", 50_000), msg("a", 50_001), msg("t", 50_002)]);
        batch_tx.send(new_batch(busy)).await.unwrap();
        batch_tx
            .send(new_batch(vec![msg("g", 60_000), msg("o", 60_001)]))
            .await
            .unwrap();

        handle.reload(keywords("B", "go")).await.unwrap();
        drop(batch_tx);

        let mut keys = Vec::new();
        while let Some(found) = match_rx.recv().await {
            keys.extend(found.into_iter().map(|m| m.key));
        }
        assert_eq!(keys, vec!["B"]);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_discards_queued_cycles() {
        let engine = DetectionEngine::new(
            keywords("A", "hi"),
            ScanOptions::default(),
            CancellationToken::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (match_tx, mut match_rx) = mpsc::channel(4);
        let (handle, task) = spawn_detection(engine, batch_rx, match_tx, WindowCap::default());

        handle.cancel();
        assert!(handle.cancel_token().is_cancelled());
        batch_tx.send(new_batch(vec![msg("h", 1), msg("i", 2)])).await.unwrap();
        drop(batch_tx);

        task.await.unwrap();
        assert!(match_rx.recv().await.is_none());
    }
}
