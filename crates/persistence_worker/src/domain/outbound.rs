use common::domain::{EventStreamReader, EventStreamWriter, FailedEvent, PersistedEvent, StreamMessage, StreamReadError};
use common::proto::{encode_failed_event, encode_persisted_event};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Move messages from the input stream into the inbound queue
///
/// Cancellation is passed to the reader, which hands out what it already
/// holds before reporting end of stream. The loop also ends when no worker
/// is left to receive. A full queue blocks the loop; nothing is dropped. The
/// inbound sender is dropped on return, which closes the queue for the workers.
pub async fn run_read_loop(
    mut reader: Box<dyn EventStreamReader>,
    inbound: flume::Sender<StreamMessage>,
    ctx: CancellationToken,
) {
    info!("resolved event read loop started");

    loop {
        match reader.read_message(&ctx).await {
            Ok(message) => {
                if inbound.send_async(message).await.is_err() {
                    warn!("inbound queue has no receivers, stopping read loop");
                    break;
                }
            }
            Err(StreamReadError::EndOfStream) => {
                info!("detected end of resolved events stream");
                break;
            }
            Err(e) => {
                error!(error = %e, "error reading resolved event message");
                if ctx.is_cancelled() {
                    info!("read loop cancelled");
                    break;
                }
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Publish persisted records keyed by device id until the queue closes
pub async fn run_persisted_publisher(
    persisted: flume::Receiver<PersistedEvent>,
    writer: Arc<dyn EventStreamWriter>,
) {
    while let Ok(record) = persisted.recv_async().await {
        let key = record.device_id().to_string();
        let payload = encode_persisted_event(&record);

        match writer.write_message(&key, payload).await {
            Ok(()) => debug!(key = %key, id = record.id(), "published persisted event"),
            Err(e) => error!(error = %e, key = %key, "unable to send persisted event message"),
        }
    }

    info!("persisted event publisher drained");
}

/// Publish failed events keyed by reason code until the queue closes
pub async fn run_failed_publisher(
    failed: flume::Receiver<FailedEvent>,
    writer: Arc<dyn EventStreamWriter>,
) {
    while let Ok(event) = failed.recv_async().await {
        debug!(message = %event.message, error = %event.error, "received failed event");
        let key = event.reason.as_key();
        let payload = encode_failed_event(&event);

        if let Err(e) = writer.write_message(&key, payload).await {
            error!(error = %e, key = %key, "unable to send failed event message");
        }
    }

    info!("failed event publisher drained");
}
