use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;

/// Acknowledges one fetched message back to JetStream
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageAck: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// Message pulled from a JetStream consumer, not yet acknowledged
///
/// Unacknowledged messages are redelivered by the server once the consumer's
/// ack wait expires.
pub struct FetchedMessage {
    pub subject: String,
    pub payload: Bytes,
    pub ack: Box<dyn MessageAck>,
}

/// Trait for JetStream consumer operations
/// Abstracts the operations needed to create and use a NATS JetStream consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    /// Create a durable pull consumer on a stream
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations
/// Abstracts the fetch operation on a pull consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch a batch of messages without acknowledging them
    /// Returns up to max_messages, waiting up to expires duration
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<FetchedMessage>>;
}

/// Trait for JetStream publisher operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Publish a message to a subject and await acknowledgment
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}
