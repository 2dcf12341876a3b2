pub mod actuator;
pub mod api;
pub mod app;
pub mod engine;
pub mod error;
pub mod io;

// Re-export the main error types for convenience
pub use error::{ChatKeysError, ChatKeysResult};

pub use actuator::{Actuator, ActuatorError};
pub use api::{ChatTransport, RawFetch, TransportError};
pub use engine::{
    Detection, DetectionEngine, FetchedBatch, Keyword, KeywordSet, Match, Message, MessageKind,
    PollOutcome, Poller, PollerConfig, ScanOptions,
};
pub use io::KeywordFileError;
