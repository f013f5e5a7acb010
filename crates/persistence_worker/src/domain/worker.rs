use crate::domain::error::PersistenceError;
use crate::domain::handlers::HandlerRegistry;
use crate::domain::outcome::OutcomeSink;
use common::domain::{PersistedEvent, ResolvedEvent, StreamMessage};
use common::proto::decode_resolved_event;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// One member of the persistence worker pool
///
/// Workers pull from the shared inbound queue until it is closed and drained.
/// They share nothing mutable; the handler registry is read-only.
pub struct EventPersistenceWorker {
    worker_id: usize,
    inbound: flume::Receiver<StreamMessage>,
    handlers: Arc<HandlerRegistry>,
    outcomes: OutcomeSink,
}

impl EventPersistenceWorker {
    pub fn new(
        worker_id: usize,
        inbound: flume::Receiver<StreamMessage>,
        handlers: Arc<HandlerRegistry>,
        outcomes: OutcomeSink,
    ) -> Self {
        Self {
            worker_id,
            inbound,
            handlers,
            outcomes,
        }
    }

    pub async fn run(self, ctx: CancellationToken) {
        debug!(worker_id = self.worker_id, "persistence worker started");

        while let Ok(message) = self.inbound.recv_async().await {
            self.process_message(&ctx, message).await;
        }

        info!(worker_id = self.worker_id, "persistence worker drained inbound queue");
    }

    #[instrument(skip_all, fields(worker_id = self.worker_id, key = %message.key))]
    pub async fn process_message(&self, ctx: &CancellationToken, message: StreamMessage) {
        let event = match decode_resolved_event(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "failed to decode resolved event");
                self.outcomes.on_invalid_event(&e, message).await;
                return;
            }
        };

        debug!(
            event_type = %event.event_type,
            device_id = event.device_id(),
            entries = event.payload.len(),
            "received resolved event"
        );

        match self.persist_event(ctx, &event).await {
            Ok(records) => {
                for record in records {
                    self.outcomes.on_persisted_event(record).await;
                }
            }
            Err(e) => {
                warn!(error = %e, reason = %e.reason(), "failed to persist event");
                self.outcomes.on_failed_event(&event, &e).await;
            }
        }
    }

    /// Project the event and dispatch it to the handler for its type
    pub async fn persist_event(
        &self,
        ctx: &CancellationToken,
        event: &ResolvedEvent,
    ) -> Result<Vec<PersistedEvent>, PersistenceError> {
        let handler = self
            .handlers
            .get(event.event_type)
            .ok_or(PersistenceError::UnhandledEventType(event.event_type))?;

        handler.persist(ctx, event.to_event(), &event.payload).await
    }
}
