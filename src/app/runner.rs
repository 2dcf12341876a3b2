//! Session wiring and the outer event loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::commands::{self, Command, HELP_TEXT};
use super::dispatcher::Dispatcher;
use super::display::{show_error, show_text, DisplayLine, DisplaySink};
use super::input::InputSource;
use crate::api::youtube::{LiveChatId, QuotaCounter, QuotaLevel, VideoId};
use crate::api::ChatTransport;
use crate::engine::{
    spawn_detection, DetectionEngine, DetectionHandle, KeywordSet, PollOutcome, Poller,
    PollerConfig, ScanOptions, WindowCap,
};
use crate::io::keyword_file::{self, load_keyword_file};

const BATCH_CHANNEL_SIZE: usize = 16;
const MATCH_CHANNEL_SIZE: usize = 64;

/// The running poller, detection worker and dispatcher.
pub struct Pipeline {
    pub detection: DetectionHandle,
    poller: JoinHandle<PollOutcome>,
    worker: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Start polling `transport` and dispatching matches.
    pub fn start(
        transport: Arc<dyn ChatTransport>,
        keywords: KeywordSet,
        options: ScanOptions,
        config: PollerConfig,
        dispatcher: Dispatcher,
    ) -> Self {
        let cancel = CancellationToken::new();
        let window_cap = WindowCap::default();
        let (batch_tx, batch_rx) = mpsc::channel(BATCH_CHANNEL_SIZE);
        let (match_tx, match_rx) = mpsc::channel(MATCH_CHANNEL_SIZE);

        let engine = DetectionEngine::new(keywords, options, CancellationToken::new());
        let (detection, worker) = spawn_detection(engine, batch_rx, match_tx, window_cap.clone());

        let poller = Poller::new(transport, config, window_cap, cancel.child_token());
        let poller = tokio::spawn(poller.run(batch_tx));
        let dispatcher = tokio::spawn(dispatcher.run(match_rx));

        Self {
            detection,
            poller,
            worker,
            dispatcher,
            cancel,
        }
    }

    /// Wait for the poller to reach a terminal outcome.
    pub async fn finished(&mut self) -> PollOutcome {
        match (&mut self.poller).await {
            Ok(outcome) => outcome,
            Err(e) => PollOutcome::Failed(format!("poller task failed: {}", e)),
        }
    }

    /// Stop polling and wait for every task.
    ///
    /// When the poller is still running, detection is cancelled as well and
    /// queued batches are discarded. After a terminal poll outcome, queued
    /// matches still drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if !self.poller.is_finished() {
            self.detection.cancel();
            let _ = self.poller.await;
        }
        let _ = self.worker.await;
        let _ = self.dispatcher.await;
        tracing::debug!("Pipeline stopped");
    }
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// State the console commands act on.
pub struct Session {
    pub sink: Arc<dyn DisplaySink>,
    pub keyword_dir: PathBuf,
    pub video_id: VideoId,
    pub live_chat_id: LiveChatId,
    pub quota: QuotaCounter,
    pub pipeline: Pipeline,
    pub actuator_status: Option<mpsc::Receiver<String>>,
}

impl Session {
    /// Run until the operator quits, the stream ends, or Ctrl-C.
    ///
    /// Returns the process exit code.
    pub async fn run(mut self, input: &mut dyn InputSource) -> i32 {
        let mut input_open = true;

        let code = loop {
            tokio::select! {
                line = input.next_line(), if input_open => match line {
                    Some(line) => {
                        if self.handle_line(&line).await == Flow::Quit {
                            break 0;
                        }
                    }
                    None => {
                        tracing::info!("⌨️ Input closed, still reading chat");
                        input_open = false;
                    }
                },
                status = next_status(&mut self.actuator_status) => match status {
                    Some(status) => show_text(self.sink.as_ref(), &format!("[ACTUATOR] {}", status)),
                    None => {
                        tracing::warn!("⚠️ Actuator stopped responding");
                        self.actuator_status = None;
                    }
                },
                outcome = self.pipeline.finished() => {
                    let message = format!("Stopped reading chat: {}", outcome.reason());
                    match outcome {
                        PollOutcome::StreamEnded => show_text(self.sink.as_ref(), &message),
                        _ => show_error(self.sink.as_ref(), &message),
                    }
                    break outcome.exit_code();
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("🛑 Interrupted");
                    break 0;
                }
            }
        };

        self.pipeline.shutdown().await;
        code
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let sink = Arc::clone(&self.sink);
        let sink = sink.as_ref();

        match commands::parse(line) {
            Command::Empty => {}
            Command::Help => show_text(sink, HELP_TEXT),
            Command::Quit => return Flow::Quit,
            Command::Invalid(response) => show_error(sink, &response),
            Command::ConfigCreate => match keyword_file::create_template(&self.keyword_dir) {
                Ok(path) => {
                    show_text(sink, &format!("Created {}", path.display()));
                    open_path(sink, &path);
                }
                Err(e) => show_error(sink, &format!("Failed to create template: {}", e)),
            },
            Command::ConfigLoad(file) => self.reload_keywords(&file).await,
            Command::DirectoryList => match keyword_file::list_files(&self.keyword_dir) {
                Ok(entries) if entries.is_empty() => {
                    show_text(sink, &format!("{} is empty", self.keyword_dir.display()))
                }
                Ok(entries) => {
                    for entry in entries {
                        let suffix = if entry.is_settings { " (settings)" } else { "" };
                        show_text(sink, &format!("  {}{}", entry.name, suffix));
                    }
                }
                Err(e) => show_error(sink, &format!("Failed to list files: {}", e)),
            },
            Command::DirectoryOpen => open_path(sink, &self.keyword_dir),
            Command::QuotaUsage => sink.show(&quota_line(self.quota.get())),
            Command::VideoRead => {
                show_text(sink, &format!("Video id: {}", self.video_id));
                show_text(sink, &format!("Live chat id: {}", self.live_chat_id));
            }
        }
        Flow::Continue
    }

    async fn reload_keywords(&mut self, file: &str) {
        let sink = Arc::clone(&self.sink);
        let sink = sink.as_ref();
        let path = resolve_keyword_path(&self.keyword_dir, file);

        let keywords = match load_keyword_file(&path) {
            Ok(keywords) => keywords,
            Err(e) => {
                show_error(sink, &format!("Failed to load {}: {}", path.display(), e));
                return;
            }
        };

        let listing: Vec<String> = keywords.iter().map(|k| format!("  {}", k)).collect();
        match self.pipeline.detection.reload(keywords).await {
            Ok(()) => {
                show_text(sink, &format!("Loaded {}", path.display()));
                for line in listing {
                    show_text(sink, &line);
                }
            }
            Err(e) => show_error(sink, &format!("Failed to apply keywords: {}", e)),
        }
    }
}

async fn next_status(status: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match status {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Relative names are looked up in the keyword directory.
pub fn resolve_keyword_path(keyword_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        keyword_dir.join(path)
    }
}

pub fn quota_line(units: u64) -> DisplayLine {
    let text = format!("Quota used this session: {}", units);
    let styled = match QuotaLevel::of(units) {
        QuotaLevel::Normal => text.as_str().green(),
        QuotaLevel::Warning => text.as_str().yellow(),
        QuotaLevel::High => text.as_str().bright_red(),
        QuotaLevel::Critical => text.as_str().red().bold(),
    };
    DisplayLine::styled(text.clone(), styled)
}

fn open_path(sink: &dyn DisplaySink, path: &Path) {
    if let Err(e) = open::that(path) {
        tracing::warn!("⚠️ Failed to open {}: {}", path.display(), e);
        show_error(sink, &format!("Could not open {}", path.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::NullActuator;
    use crate::api::{RawFetch, TransportError};
    use crate::app::display::MemorySink;
    use crate::app::input::ScriptedInput;
    use crate::engine::{Keyword, Message, MessageKind};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Reports either a quiet chat or the end of the stream on every fetch.
    struct FixedTransport {
        ended: bool,
    }

    #[async_trait]
    impl ChatTransport for FixedTransport {
        async fn fetch(&self) -> Result<RawFetch, TransportError> {
            let kind = if self.ended {
                MessageKind::Exit
            } else {
                MessageKind::Unsupported
            };
            Ok(RawFetch {
                messages: vec![Message::control(kind)],
                suggested_delay: Duration::ZERO,
            })
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn session_with(keyword_dir: &Path, sink: MemorySink, ended: bool) -> Session {
        let sink: Arc<dyn DisplaySink> = Arc::new(sink);
        let dispatcher = Dispatcher::new(Arc::new(NullActuator), Arc::clone(&sink));
        let desired_delay = if ended {
            Duration::from_millis(10)
        } else {
            Duration::from_secs(3600)
        };
        let pipeline = Pipeline::start(
            Arc::new(FixedTransport { ended }),
            KeywordSet::new(vec![Keyword::new("A", "", vec!["hi".to_string()])]),
            ScanOptions::default(),
            PollerConfig {
                desired_delay,
                max_results: 120,
            },
            dispatcher,
        );
        Session {
            sink,
            keyword_dir: keyword_dir.to_path_buf(),
            video_id: VideoId("abc".to_string()),
            live_chat_id: LiveChatId("chat-1".to_string()),
            quota: QuotaCounter::default(),
            pipeline,
            actuator_status: None,
        }
    }

    fn session(keyword_dir: &Path, sink: MemorySink) -> Session {
        session_with(keyword_dir, sink, false)
    }

    #[tokio::test]
    async fn test_commands_write_responses() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let mut session = session(dir.path(), sink.clone());

        assert_eq!(session.handle_line("help").await, Flow::Continue);
        assert!(sink.contains("quota (q) usage"));

        session.quota.add(6);
        session.handle_line("q usage").await;
        assert!(sink.contains("Quota used this session: 6"));

        session.handle_line("t v r").await;
        assert!(sink.contains("Video id: abc"));
        assert!(sink.contains("Live chat id: chat-1"));

        session.handle_line("bogus").await;
        assert!(sink.contains("Unknown command 'bogus'"));

        assert_eq!(session.handle_line("quit").await, Flow::Quit);
        session.pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_config_load_reloads_keywords() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keys.txt"), "B: left\n").unwrap();
        let sink = MemorySink::new();
        let mut session = session(dir.path(), sink.clone());

        session.handle_line("c l keys.txt").await;
        assert!(sink.contains("Loaded"));
        assert!(sink.contains("{B}: left"));

        session.handle_line("c l missing.txt").await;
        assert!(sink.contains("Failed to load"));
        session.pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_directory_list_flags_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keys.txt"), "A: a\n").unwrap();
        std::fs::write(dir.path().join("settings.toml"), "").unwrap();
        let sink = MemorySink::new();
        let mut session = session(dir.path(), sink.clone());

        session.handle_line("config directory list").await;
        assert!(sink.contains("  keys.txt"));
        assert!(sink.contains("  settings.toml (settings)"));
        session.pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_end_exits_with_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let session = session_with(dir.path(), sink.clone(), true);

        // input closes immediately; the loop keeps going until the stream ends
        let mut input = ScriptedInput::new(Vec::<String>::new());
        let code = session.run(&mut input).await;
        assert_eq!(code, 1);
        assert!(sink.contains("stream ended"));
    }

    #[tokio::test]
    async fn test_quit_exits_with_code_zero() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let session = session(dir.path(), sink.clone());

        let mut input = ScriptedInput::new(["quit"]);
        assert_eq!(session.run(&mut input).await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_while_polling_cancels_detection() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), MemorySink::new());
        let detection = session.pipeline.detection.cancel_token();

        session.pipeline.shutdown().await;
        assert!(detection.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_after_stream_end_lets_detection_drain() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), MemorySink::new(), true);
        assert_eq!(session.pipeline.finished().await, PollOutcome::StreamEnded);
        let detection = session.pipeline.detection.cancel_token();

        session.pipeline.shutdown().await;
        assert!(!detection.is_cancelled());
    }

    #[test]
    fn test_resolve_keyword_path() {
        let dir = Path::new("/keys");
        assert_eq!(resolve_keyword_path(dir, "a.txt"), PathBuf::from("/keys/a.txt"));
        assert_eq!(resolve_keyword_path(dir, "/other/b.txt"), PathBuf::from("/other/b.txt"));
    }

    #[test]
    fn test_quota_line_text() {
        assert_eq!(quota_line(3500).plain, "Quota used this session: 3500");
    }
}
