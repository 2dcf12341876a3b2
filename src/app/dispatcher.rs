//! Dispatcher: turns matches into actuator commands and display lines.

use std::sync::Arc;

use chrono::Local;
use colored::Colorize;
use tokio::sync::mpsc;

use super::display::{DisplayLine, DisplaySink};
use crate::actuator::{format_key_command, Actuator};
use crate::engine::{Match, Message};

pub struct Dispatcher {
    actuator: Arc<dyn Actuator>,
    sink: Arc<dyn DisplaySink>,
}

impl Dispatcher {
    pub fn new(actuator: Arc<dyn Actuator>, sink: Arc<dyn DisplaySink>) -> Self {
        Self { actuator, sink }
    }

    /// Send the key command for `found` and show how it was spelled.
    pub async fn dispatch(&self, found: &Match) {
        let command = format_key_command(&found.key, &found.speech);
        if let Err(e) = self.actuator.send_command(&command).await {
            tracing::error!("❌ Failed to send '{}' to {} actuator: {}", command, self.actuator.name(), e);
        }

        for line in render_match_lines(found) {
            self.sink.show(&line);
        }
    }

    /// Dispatch every match in arrival order until the channel closes.
    pub async fn run(self, mut matches: mpsc::Receiver<Vec<Match>>) {
        while let Some(batch) = matches.recv().await {
            for found in &batch {
                self.dispatch(found).await;
            }
        }
        tracing::debug!("Dispatcher stopped");
    }
}

/// Header, one line per spelling message, then a blank separator.
pub fn render_match_lines(found: &Match) -> Vec<DisplayLine> {
    let header = format!("Found keyword! Pressing {{{}}} from:", found.key);
    let mut lines = Vec::with_capacity(found.messages.len() + 2);
    lines.push(DisplayLine::styled(header.clone(), header.as_str().bold()));
    lines.extend(found.messages.iter().map(render_message_line));
    lines.push(DisplayLine::blank());
    lines
}

fn render_message_line(message: &Message) -> DisplayLine {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let mut chars = message.text.chars();
    let first: String = chars.next().map(String::from).unwrap_or_default();
    let rest: String = chars.collect();

    let plain = format!("[{}] {}: {}{}", time, message.author, first, rest);
    let styled = format!(
        "[{}] {}: {}{}",
        time,
        message.author.as_str().cyan(),
        first.as_str().green().bold(),
        rest
    );
    DisplayLine { plain, styled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::ActuatorError;
    use crate::app::display::MemorySink;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingActuator {
        commands: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        async fn send_command(&self, command: &str) -> Result<(), ActuatorError> {
            self.commands.lock().push(command.to_string());
            if self.fail {
                return Err(ActuatorError::Handshake("gone".to_string()));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn sample_match(key: &str) -> Match {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Match {
            key: key.to_string(),
            speech: "jump".to_string(),
            messages: VecDeque::from(vec![
                Message::text("alice", "h", at),
                Message::text("bob", "ice", at),
            ]),
            completed_at: at,
        }
    }

    #[test]
    fn test_render_match_lines() {
        let found = sample_match("A");
        let lines = render_match_lines(&found);
        let time = found.completed_at.with_timezone(&Local).format("%H:%M:%S");

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].plain, "Found keyword! Pressing {A} from:");
        assert_eq!(lines[1].plain, format!("[{}] alice: h", time));
        assert_eq!(lines[2].plain, format!("[{}] bob: ice", time));
        assert_eq!(lines[3].plain, "");
    }

    #[tokio::test]
    async fn test_run_dispatches_in_order() {
        let actuator = Arc::new(RecordingActuator::default());
        let sink = MemorySink::new();
        let dispatcher = Dispatcher::new(actuator.clone(), Arc::new(sink.clone()));

        let (tx, rx) = mpsc::channel(4);
        tx.send(vec![sample_match("A"), sample_match("B")]).await.unwrap();
        tx.send(vec![sample_match("C")]).await.unwrap();
        drop(tx);
        dispatcher.run(rx).await;

        assert_eq!(
            *actuator.commands.lock(),
            vec!["KEY:A:jump", "KEY:B:jump", "KEY:C:jump"]
        );
        assert_eq!(sink.plain_lines().len(), 12);
    }

    #[tokio::test]
    async fn test_actuator_failure_still_displays() {
        let actuator = Arc::new(RecordingActuator {
            fail: true,
            ..Default::default()
        });
        let sink = MemorySink::new();
        let dispatcher = Dispatcher::new(actuator, Arc::new(sink.clone()));

        dispatcher.dispatch(&sample_match("A")).await;
        assert!(sink.contains("Pressing {A}"));
    }
}
