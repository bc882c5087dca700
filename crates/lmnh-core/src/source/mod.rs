//! Live event sources for stream mode.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod replay;

#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;
pub use replay::ReplaySource;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has nothing left to deliver and never will.
    #[error("event source exhausted")]
    Exhausted,
    #[error("event source transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait StreamSource: Send {
    /// Wait up to `timeout` for the next message payload. `Ok(None)` is an
    /// empty poll.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError>;
}
