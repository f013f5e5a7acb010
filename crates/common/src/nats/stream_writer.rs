use crate::domain::{DomainError, DomainResult, EventStreamWriter};
use crate::nats::traits::JetStreamPublisher;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Publishes keyed messages to a JetStream stream as `{base_subject}.{key}`
pub struct NatsStreamWriter {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl NatsStreamWriter {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        Self {
            publisher,
            base_subject,
        }
    }
}

#[async_trait]
impl EventStreamWriter for NatsStreamWriter {
    async fn write_message(&self, key: &str, payload: Bytes) -> DomainResult<()> {
        let subject = format!("{}.{}", self.base_subject, key);
        let payload_size = payload.len();

        self.publisher
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| DomainError::PublishError(format!("{:#}", e)))?;

        debug!(subject = %subject, payload_size, "Published stream message");
        Ok(())
    }
}
