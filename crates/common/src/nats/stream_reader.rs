use crate::domain::{EventStreamReader, StreamMessage, StreamReadError};
use crate::nats::traits::{FetchedMessage, JetStreamConsumer, PullConsumer};
use anyhow::Result;
use async_nats::jetstream::consumer::{pull::Config as PullConfig, AckPolicy};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reads stream messages one at a time from a durable JetStream pull consumer
///
/// Messages are fetched in batches and buffered locally. Each one is acked
/// when it is handed out. The message key is the last token of the subject,
/// so `resolved_events.42` yields key `42`.
pub struct NatsStreamReader {
    consumer: Box<dyn PullConsumer>,
    batch_size: usize,
    batch_wait: Duration,
    buffered: VecDeque<FetchedMessage>,
}

impl NatsStreamReader {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        filter_subject: &str,
        batch_size: usize,
        batch_wait_secs: u64,
    ) -> Result<Self> {
        info!(
            stream = %stream_name,
            consumer = %consumer_name,
            subject = %filter_subject,
            "Creating stream reader"
        );

        let config = PullConfig {
            durable_name: Some(consumer_name.to_string()),
            filter_subject: filter_subject.to_string(),
            ack_policy: AckPolicy::Explicit,
            ..Default::default()
        };
        let consumer = jetstream.create_consumer(config, stream_name).await?;

        Ok(Self::from_consumer(
            consumer,
            batch_size,
            Duration::from_secs(batch_wait_secs),
        ))
    }

    pub fn from_consumer(
        consumer: Box<dyn PullConsumer>,
        batch_size: usize,
        batch_wait: Duration,
    ) -> Self {
        Self {
            consumer,
            batch_size,
            batch_wait,
            buffered: VecDeque::new(),
        }
    }
}

fn subject_key(subject: &str) -> &str {
    subject.rsplit('.').next().unwrap_or(subject)
}

#[async_trait]
impl EventStreamReader for NatsStreamReader {
    /// Buffered messages are handed out even after cancellation, so nothing
    /// fetched is left behind; end of stream is reported once the buffer is empty.
    async fn read_message(
        &mut self,
        ctx: &CancellationToken,
    ) -> Result<StreamMessage, StreamReadError> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                // an unacked message is redelivered by the server
                message.ack.ack().await.map_err(StreamReadError::Read)?;
                return Ok(StreamMessage::new(
                    subject_key(&message.subject),
                    message.payload,
                ));
            }

            if ctx.is_cancelled() {
                return Err(StreamReadError::EndOfStream);
            }

            let batch = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("Stream reader cancelled");
                    return Err(StreamReadError::EndOfStream);
                }
                result = self.consumer.fetch_messages(self.batch_size, self.batch_wait) => {
                    result.map_err(StreamReadError::Read)?
                }
            };

            if batch.is_empty() {
                debug!("No messages available, fetching again");
                continue;
            }

            debug!(count = batch.len(), "Fetched message batch");
            self.buffered.extend(batch);
        }
    }
}
