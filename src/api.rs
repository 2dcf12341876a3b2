pub mod youtube;

use std::time::Duration;

use async_trait::async_trait;

use crate::engine::message::Message;
pub use youtube::TransportError;

/// Result of one fetch from a chat source.
///
/// Terminal conditions travel in-band: a stream that ended is reported as a
/// [`MessageKind::Exit`](crate::engine::message::MessageKind::Exit) record and
/// an unusable response as a
/// [`MessageKind::Error`](crate::engine::message::MessageKind::Error) record.
/// A source with no chat activity returns a single
/// [`MessageKind::Unsupported`](crate::engine::message::MessageKind::Unsupported)
/// record rather than an empty list.
#[derive(Debug, Clone)]
pub struct RawFetch {
    pub messages: Vec<Message>,
    /// Poll interval suggested by the server
    pub suggested_delay: Duration,
}

/// Source of chat messages polled by the engine.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the current message set
    async fn fetch(&self) -> Result<RawFetch, TransportError>;

    /// Transport name for logs
    fn name(&self) -> &'static str;
}
