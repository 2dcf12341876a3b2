//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリ上の `settings.toml` を読み書きします。

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::keyword_file::SETTINGS_FILE_NAME;

/// 新規作成時に書き込まれるAPIキーのプレースホルダー
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// ログ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
    /// 保存するログファイル数上限（0は無制限）
    pub max_log_files: u32,
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logging: true,
            max_log_files: 30,
            log_dir: None,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// YouTube Data API v3 キー
    pub api_key: String,
    /// 希望ポーリング間隔（ミリ秒）
    pub delay_ms: u64,
    /// 1回の取得で要求する最大メッセージ数
    pub max_results: usize,
    /// 読み上げ速度
    pub tts_wpm: u32,
    /// アクチュエータを起動するPythonインタプリタ
    pub python: String,
    /// アクチュエータスクリプト（Noneの場合は同梱スクリプト）
    pub actuator_script: Option<PathBuf>,
    /// キーワードファイルのディレクトリ（Noneの場合はXDGデフォルト使用）
    pub keyword_dir: Option<PathBuf>,

    /// ログ設定
    pub log: LogSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            delay_ms: 6500,
            max_results: 120,
            tts_wpm: 160,
            python: default_python().to_string(),
            actuator_script: None,
            keyword_dir: None,
            log: LogSettings::default(),
        }
    }
}

#[cfg(target_os = "windows")]
fn default_python() -> &'static str {
    "python"
}

#[cfg(not(target_os = "windows"))]
fn default_python() -> &'static str {
    "python3"
}

impl AppSettings {
    /// APIキーが設定されているか検証
    pub fn validate(&self) -> Result<()> {
        let key = self.api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            bail!("No API key configured, set `api_key` in {}", SETTINGS_FILE_NAME);
        }
        if self.max_results == 0 {
            bail!("`max_results` must be greater than zero");
        }
        Ok(())
    }
}

/// 設定管理マネージャー
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
    data_dir: PathBuf,
}

impl SettingsManager {
    /// XDGディレクトリを使う設定マネージャーを作成
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("dev", "sifyfy", "chatkeys")
            .context("Failed to get project directories")?;

        let settings_path = project_dirs.config_dir().join(SETTINGS_FILE_NAME);
        debug!("Settings file path: {}", settings_path.display());

        Ok(Self::with_paths(settings_path, project_dirs.data_dir()))
    }

    /// 任意のパスを使う設定マネージャーを作成
    pub fn with_paths(settings_path: impl Into<PathBuf>, data_dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: settings_path.into(),
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// 設定ファイルが存在するかチェック
    pub fn exists(&self) -> bool {
        self.settings_path.exists()
    }

    /// 設定を読み込み
    pub fn load(&self) -> Result<AppSettings> {
        let content = fs::read_to_string(&self.settings_path).with_context(|| {
            format!("Failed to read settings file: {}", self.settings_path.display())
        })?;

        let settings: AppSettings = toml::from_str(&content).with_context(|| {
            format!("Failed to parse settings file: {}", self.settings_path.display())
        })?;

        info!("✅ Settings loaded from: {}", self.settings_path.display());
        Ok(settings)
    }

    /// 設定を保存
    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(&self.settings_path, content).with_context(|| {
            format!("Failed to write settings file: {}", self.settings_path.display())
        })?;

        info!("💾 Settings saved to: {}", self.settings_path.display());
        Ok(())
    }

    /// デフォルト設定ファイルを作成
    pub fn create_default(&self) -> Result<&Path> {
        self.save(&AppSettings::default())?;
        Ok(&self.settings_path)
    }

    /// キーワードファイルのディレクトリ
    pub fn keyword_dir(&self, settings: &AppSettings) -> PathBuf {
        settings
            .keyword_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("keywords"))
    }

    /// ログファイルのディレクトリ
    pub fn log_dir(&self, settings: &AppSettings) -> PathBuf {
        settings
            .log
            .log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }
}
