use crate::domain::result::DomainResult;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Keyed message read from or written to an event stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub key: String,
    pub payload: Bytes,
}

impl StreamMessage {
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StreamReadError {
    /// The stream has ended; readers stop without treating this as a failure
    #[error("end of stream")]
    EndOfStream,

    /// Transient read failure; the read may be retried
    #[error("stream read failed: {0:#}")]
    Read(#[source] anyhow::Error),
}

/// Source of inbound event messages
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventStreamReader: Send {
    /// Read the next message, waiting until one is available
    ///
    /// Cancelling `ctx` ends the stream with `StreamReadError::EndOfStream`.
    async fn read_message(
        &mut self,
        ctx: &CancellationToken,
    ) -> Result<StreamMessage, StreamReadError>;
}

/// Sink for outbound event messages
///
/// Implementations should:
/// - Publish the payload under the given key
/// - Wait for broker acknowledgment before returning
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventStreamWriter: Send + Sync {
    async fn write_message(&self, key: &str, payload: Bytes) -> DomainResult<()>;
}
