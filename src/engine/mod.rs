//! Polling, windowing and keyword detection.

pub mod detector;
pub mod keyword;
pub mod message;
pub mod poller;
pub mod scanner;
pub mod window;
pub mod worker;

pub use detector::{Detection, DetectionEngine, Match};
pub use keyword::{Keyword, KeywordSet};
pub use message::{Message, MessageKind};
pub use poller::{FetchedBatch, PollOutcome, Poller, PollerConfig};
pub use scanner::{scan, ScanHit, ScanOptions};
pub use window::{assemble, WindowCap};
pub use worker::{spawn_detection, DetectionHandle};
