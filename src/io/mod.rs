//! File-backed collaborators: keyword files, settings and log output.

pub mod keyword_file;
pub mod logging;
pub mod settings;

// Re-export commonly used types and functions
pub use keyword_file::{create_template, list_files, load_keyword_file, KeywordFileError};
pub use logging::init_logging;
pub use settings::{AppSettings, LogSettings, SettingsManager};
