//! 子プロセスとして起動するアクチュエータ

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};

use super::{format_wpm_command, Actuator, ActuatorError};

/// ハンドシェイク応答の待ち時間
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// 子プロセスのアクチュエータ
///
/// ドロップ時に子プロセスも終了する。
pub struct ProcessActuator {
    stdin: Mutex<ChildStdin>,
    _child: Child,
}

impl ProcessActuator {
    /// `<python> <script>` を起動
    pub async fn launch(
        python: &str,
        script: &Path,
        wpm: u32,
    ) -> Result<(Self, mpsc::Receiver<String>), ActuatorError> {
        let mut command = Command::new(python);
        command.arg(script);
        tracing::info!("🚀 Starting actuator: {} {}", python, script.display());
        Self::spawn(command, wpm).await
    }

    /// 任意のコマンドを起動し、`WPM` を送って最初の応答行を待つ
    ///
    /// 以降の標準出力は返されたチャネルに1行ずつ流れる。
    pub async fn spawn(
        mut command: Command,
        wpm: u32,
    ) -> Result<(Self, mpsc::Receiver<String>), ActuatorError> {
        let program = command.as_std().get_program().to_string_lossy().to_string();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActuatorError::Spawn { program, source })?;

        let mut stdin = child.stdin.take().ok_or(ActuatorError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(ActuatorError::Pipe("stdout"))?;
        let mut lines = BufReader::new(stdout).lines();

        write_line(&mut stdin, &format_wpm_command(wpm)).await?;

        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| ActuatorError::Handshake("timed out waiting for a response".to_string()))??;
        match handshake {
            Some(line) if !line.trim().is_empty() => {
                tracing::info!("✅ Actuator ready: {}", line.trim());
            }
            Some(_) => return Err(ActuatorError::Handshake("empty response".to_string())),
            None => return Err(ActuatorError::Handshake("process exited".to_string())),
        }

        let (status_tx, status_rx) = mpsc::channel(32);
        tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if status_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::warn!("⚠️ Actuator output closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("❌ Failed to read actuator output: {}", e);
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                stdin: Mutex::new(stdin),
                _child: child,
            },
            status_rx,
        ))
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), ActuatorError> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

#[async_trait]
impl Actuator for ProcessActuator {
    async fn send_command(&self, command: &str) -> Result<(), ActuatorError> {
        let mut stdin = self.stdin.lock().await;
        write_line(&mut stdin, command).await?;
        tracing::debug!("📤 Sent to actuator: {}", command);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
