//! End-to-end detection over a scripted chat transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatkeys::{
    actuator::{Actuator, ActuatorError},
    app::{Dispatcher, MemorySink, Pipeline},
    engine::{spawn_detection, window::WindowCap},
    ChatTransport, DetectionEngine, FetchedBatch, Keyword, KeywordSet, Match, Message,
    MessageKind, PollOutcome, Poller, PollerConfig, RawFetch, ScanOptions, TransportError,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Replays one response per fetch; fails once the script runs out.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Vec<Message>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Vec<Message>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn fetch(&self) -> Result<RawFetch, TransportError> {
        match self.responses.lock().pop_front() {
            Some(messages) => Ok(RawFetch {
                messages,
                suggested_delay: Duration::ZERO,
            }),
            None => Err(TransportError::Status(503)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingActuator {
    commands: Mutex<Vec<String>>,
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn send_command(&self, command: &str) -> Result<(), ActuatorError> {
        self.commands.lock().push(command.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn msg(author: &str, text: &str, secs: i64) -> Message {
    Message::text(author, text, Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
}

fn keyword(key: &str, words: &[&str]) -> Keyword {
    Keyword::new(key, format!("{} pressed", key), words.iter().map(|w| w.to_string()).collect())
}

fn config() -> PollerConfig {
    PollerConfig {
        desired_delay: Duration::from_millis(1),
        max_results: 120,
    }
}

/// Run poller and detection worker until the script is exhausted.
async fn detect_all(keywords: Vec<Keyword>, polls: Vec<Vec<Message>>) -> (Vec<Match>, PollOutcome) {
    let window_cap = WindowCap::default();
    let (batch_tx, batch_rx) = mpsc::channel(8);
    let (match_tx, mut match_rx) = mpsc::channel(8);

    let engine = DetectionEngine::new(
        KeywordSet::new(keywords),
        ScanOptions::default(),
        CancellationToken::new(),
    );
    let (_handle, worker) = spawn_detection(engine, batch_rx, match_tx, window_cap.clone());
    let poller = Poller::new(
        ScriptedTransport::new(polls),
        config(),
        window_cap,
        CancellationToken::new(),
    );

    let outcome = poller.run(batch_tx).await;
    worker.await.unwrap();

    let mut matches = Vec::new();
    while let Some(found) = match_rx.recv().await {
        matches.extend(found);
    }
    (matches, outcome)
}

#[tokio::test]
async fn test_match_straddling_polls_is_reported_once() {
    let c = msg("alice", "c", 1);
    let a = msg("bob", "a", 2);
    let t = msg("carol", "t", 3);
    let polls = vec![
        vec![c.clone(), a.clone()],
        vec![c.clone(), a.clone(), t.clone()],
        vec![c.clone(), a.clone(), t.clone(), msg("dave", "x", 4)],
        vec![a.clone(), t.clone(), msg("dave", "x", 4)],
    ];

    let (matches, outcome) = detect_all(vec![keyword("A", &["cat"])], polls).await;

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].key, "A");
    assert_eq!(
        matches[0].messages.iter().cloned().collect::<Vec<_>>(),
        vec![c, a, t.clone()]
    );
    assert_eq!(matches[0].completed_at, t.timestamp);
    assert_eq!(outcome.exit_code(), -1);
}

#[tokio::test]
async fn test_broken_sequence_restarts() {
    let polls = vec![vec![
        msg("u", "a", 1),
        msg("u", "b", 2),
        msg("u", "a", 3),
        msg("u", "b", 4),
        msg("u", "c", 5),
    ]];

    let (matches, _) = detect_all(vec![keyword("K", &["abc"])], polls).await;

    assert_eq!(matches.len(), 1);
    let seconds: Vec<i64> = matches[0]
        .messages
        .iter()
        .map(|m| m.timestamp.timestamp() - 1_700_000_000)
        .collect();
    assert_eq!(seconds, vec![3, 4, 5]);
}

#[tokio::test]
async fn test_long_message_breaks_spelling() {
    let polls = vec![vec![
        msg("u", "c", 1),
        msg("u", "a", 2),
        msg("u", "hello", 3),
        msg("u", "t", 4),
    ]];

    let (matches, _) = detect_all(vec![keyword("A", &["cat"])], polls).await;
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_carried_window_never_exceeds_longest_keyword() {
    let mut history = Vec::new();
    let mut polls = Vec::new();
    for i in 0..40 {
        history.push(msg("u", "z", i));
        polls.push(history.clone());
    }

    let window_cap = WindowCap::new(4);
    let (batch_tx, mut batch_rx) = mpsc::channel::<FetchedBatch>(64);
    let poller = Poller::new(
        ScriptedTransport::new(polls),
        config(),
        window_cap,
        CancellationToken::new(),
    );
    let outcome = poller.run(batch_tx).await;
    assert!(matches!(outcome, PollOutcome::Failed(_)));

    let mut batches = 0;
    while let Some(batch) = batch_rx.recv().await {
        assert!(batch.old.len() <= 4);
        assert_eq!(batch.new.len(), 1);
        batches += 1;
    }
    assert_eq!(batches, 40);
}

#[tokio::test]
async fn test_stream_end_stops_polling() {
    let polls = vec![
        vec![msg("u", "g", 1)],
        vec![Message::control(MessageKind::Exit)],
        vec![msg("u", "o", 2)],
    ];

    let (matches, outcome) = detect_all(vec![keyword("G", &["go"])], polls).await;
    assert!(matches.is_empty());
    assert_eq!(outcome, PollOutcome::StreamEnded);
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_pipeline_dispatches_in_configured_order() {
    let actuator = Arc::new(RecordingActuator::default());
    let sink = MemorySink::new();
    let dispatcher = Dispatcher::new(actuator.clone(), Arc::new(sink.clone()));

    let polls = vec![
        vec![msg("u", "d", 1), msg("u", "o", 2)],
        vec![
            msg("u", "d", 1),
            msg("u", "o", 2),
            msg("u", "g", 3),
            msg("u", "c", 4),
            msg("u", "a", 5),
            msg("u", "t", 6),
        ],
    ];
    let keywords = KeywordSet::new(vec![keyword("CAT", &["cat", "kitten"]), keyword("DOG", &["dog"])]);

    let mut pipeline = Pipeline::start(
        ScriptedTransport::new(polls),
        keywords,
        ScanOptions::default(),
        config(),
        dispatcher,
    );
    let outcome = pipeline.finished().await;
    pipeline.shutdown().await;

    assert_eq!(outcome.exit_code(), -1);
    assert_eq!(
        *actuator.commands.lock(),
        vec!["KEY:CAT:CAT pressed", "KEY:DOG:DOG pressed"]
    );
    assert!(sink.contains("Found keyword! Pressing {CAT} from:"));
    assert!(sink.contains("Found keyword! Pressing {DOG} from:"));
}
