//! Crate-wide error types.
//!
//! Each subsystem owns a focused error enum; [`ChatKeysError`] wraps them so
//! the application layer can propagate any of them with `?`.

use thiserror::Error;

pub use crate::actuator::ActuatorError;
pub use crate::api::youtube::TransportError;
pub use crate::io::keyword_file::KeywordFileError;

/// Top-level error for the chatkeys library.
#[derive(Error, Debug)]
pub enum ChatKeysError {
    /// Fetching chat data failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Keyword file could not be parsed
    #[error("Keyword file error: {0}")]
    KeywordFile(#[from] KeywordFileError),

    /// The actuator process failed
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    /// Invalid or missing settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, with context
    #[error(transparent)]
    General(#[from] anyhow::Error),
}

impl ChatKeysError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type ChatKeysResult<T> = Result<T, ChatKeysError>;
