//! 外部アクチュエータ（読み上げ・キー入力）との連携
//!
//! アクチュエータは1行1コマンドのテキストプロトコルで操作します。
//!
//! - `WPM:<n>` 読み上げ速度の設定
//! - `KEY:<key>:<speech>` キー入力と読み上げ

pub mod null;
pub mod process;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use null::NullActuator;
pub use process::ProcessActuator;

/// アクチュエータのエラー型
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Failed to start actuator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Actuator {0} is not piped")]
    Pipe(&'static str),

    #[error("Actuator I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Actuator handshake failed: {0}")]
    Handshake(String),
}

/// アクチュエータトレイト
#[async_trait]
pub trait Actuator: Send + Sync {
    /// コマンドを1行送信
    async fn send_command(&self, command: &str) -> Result<(), ActuatorError>;

    /// アクチュエータ名を取得
    fn name(&self) -> &'static str;
}

/// キー入力コマンドを組み立てる
///
/// `:` はプロトコルの区切り文字なので、読み上げ文中のものは空白に置き換える。
pub fn format_key_command(key: &str, speech: &str) -> String {
    format!("KEY:{}:{}", key, speech.replace(':', " "))
}

/// 読み上げ速度コマンドを組み立てる
pub fn format_wpm_command(wpm: u32) -> String {
    format!("WPM:{}", wpm)
}

/// 同梱スクリプトのパス
///
/// 実行ファイルの隣の `actuator/main.py` を優先し、無ければカレントディレクトリからの相対パス。
pub fn bundled_script_path() -> PathBuf {
    let relative = PathBuf::from("actuator").join("main.py");
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&relative)))
        .filter(|path| path.exists())
        .unwrap_or(relative)
}
