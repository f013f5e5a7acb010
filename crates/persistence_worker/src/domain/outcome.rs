use crate::domain::error::PersistenceError;
use common::domain::{FailedEvent, FailureReason, PersistedEvent, ResolvedEvent, StreamMessage};
use common::proto::encode_resolved_event;
use tracing::{debug, error};

pub const INVALID_EVENT_MESSAGE: &str = "message could not be parsed";
pub const FAILED_EVENT_MESSAGE: &str = "event could not be processed";

/// Worker-side handle onto the persisted and failed outcome queues
///
/// Each worker owns one clone. The outcome queues close once every clone is
/// dropped, which happens only after all workers have exited.
#[derive(Clone)]
pub struct OutcomeSink {
    functional_area: String,
    persisted: flume::Sender<PersistedEvent>,
    failed: flume::Sender<FailedEvent>,
}

impl OutcomeSink {
    pub fn new(
        functional_area: String,
        persisted: flume::Sender<PersistedEvent>,
        failed: flume::Sender<FailedEvent>,
    ) -> Self {
        Self {
            functional_area,
            persisted,
            failed,
        }
    }

    /// Inbound bytes could not be decoded; the original bytes are kept
    pub async fn on_invalid_event(&self, err: &anyhow::Error, message: StreamMessage) {
        let failed = FailedEvent {
            reason: FailureReason::Invalid,
            functional_area: self.functional_area.clone(),
            message: INVALID_EVENT_MESSAGE.to_string(),
            error: format!("{:#}", err),
            payload: message.payload,
        };
        self.send_failed(failed).await;
    }

    /// A decoded event could not be persisted; the event is re-encoded
    pub async fn on_failed_event(&self, event: &ResolvedEvent, err: &PersistenceError) {
        let failed = FailedEvent {
            reason: err.reason(),
            functional_area: self.functional_area.clone(),
            message: FAILED_EVENT_MESSAGE.to_string(),
            error: err.to_string(),
            payload: encode_resolved_event(event),
        };
        self.send_failed(failed).await;
    }

    pub async fn on_persisted_event(&self, persisted: PersistedEvent) {
        let id = persisted.id();
        if self.persisted.send_async(persisted).await.is_err() {
            error!(id, "persisted event queue closed, dropping record");
            return;
        }
        debug!(id, "queued persisted event");
    }

    async fn send_failed(&self, failed: FailedEvent) {
        let reason = failed.reason;
        if self.failed.send_async(failed).await.is_err() {
            error!(reason = %reason, "failed event queue closed, dropping failure");
            return;
        }
        debug!(reason = %reason, "queued failed event");
    }
}
