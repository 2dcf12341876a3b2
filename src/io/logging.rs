// ログ初期化

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::settings::LogSettings;

/// 表示用ログのターゲット（ファイルのみに出力される）
pub const DISPLAY_TARGET: &str = "chatkeys::display";

const LOG_FILE_PREFIX: &str = "chatkeys_";

/// セッションごとのログファイル名
pub fn session_log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("{}{}.log", LOG_FILE_PREFIX, now.format("%Y%m%d%H%M%S"))
}

/// 古いログファイルを削除し、新規セッション分の空きを作る
///
/// 削除したファイル数を返す。`max_log_files` が0の場合は何もしない。
pub fn cleanup_old_logs(log_dir: &Path, max_log_files: u32) -> anyhow::Result<usize> {
    if max_log_files == 0 || !log_dir.exists() {
        return Ok(0);
    }

    let pattern = log_dir.join(format!("{}*.log", LOG_FILE_PREFIX));
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .context("Invalid log file pattern")?
        .filter_map(Result::ok)
        .collect();
    // タイムスタンプ付きのファイル名なので名前順 = 作成順
    files.sort();

    let keep = max_log_files as usize - 1;
    let excess = files.len().saturating_sub(keep);
    for path in files.iter().take(excess) {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove old log file: {}", path.display()))?;
    }

    Ok(excess)
}

/// ログ初期化
///
/// コンソール（stderr）と、有効な場合はログディレクトリ内のセッションファイルに出力する。
/// 返されたガードはプログラム終了まで保持すること。
pub fn init_logging(
    settings: &LogSettings,
    log_dir: &Path,
    file_logging: bool,
) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("Invalid log level")?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter_fn(|metadata| metadata.target() != DISPLAY_TARGET));

    let mut guard = None;
    let mut removed = 0;
    let file_layer = if file_logging && settings.enable_file_logging {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        removed = cleanup_old_logs(log_dir, settings.max_log_files)?;

        let appender = tracing_appender::rolling::never(
            log_dir,
            session_log_file_name(chrono::Local::now()),
        );
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);

        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if guard.is_some() {
        tracing::info!("📁 Logging to {}", log_dir.display());
        if removed > 0 {
            tracing::debug!("🧹 Removed {} old log files", removed);
        }
    } else {
        tracing::info!("📴 File logging disabled");
    }

    Ok(guard)
}
