#![cfg(feature = "integration-tests")]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use common::domain::{
    DomainError, DomainResult, Event, EventManagementApi, EventPayload, EventStreamReader,
    EventStreamWriter, EventType, FailureReason, LocationEntry, LocationEvent,
    LocationEventCreateRequest, MeasurementEntry, MeasurementEvent, MeasurementEventCreateRequest,
    RelationshipIds, ResolvedEvent, StreamMessage, StreamReadError,
};
use common::proto::{decode_failed_event, decode_persisted_event, decode_resolved_event, encode_resolved_event};
use common::MockEventManagementApi;
use em_runner::{LifecycleError, LifecycleManager, LifecycleState};
use persistence_worker::domain::{
    EventPersistenceConfig, EventPersistenceProcessor, HandlerRegistry, FAILED_EVENT_MESSAGE,
    INVALID_EVENT_MESSAGE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

// Reader backed by a channel; ends when the sender side is dropped
struct ChannelReader {
    messages: flume::Receiver<StreamMessage>,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl EventStreamReader for ChannelReader {
    async fn read_message(
        &mut self,
        ctx: &CancellationToken,
    ) -> Result<StreamMessage, StreamReadError> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(StreamReadError::EndOfStream),
            message = self.messages.recv_async() => match message {
                Ok(message) => {
                    self.reads.fetch_add(1, Ordering::SeqCst);
                    Ok(message)
                }
                Err(_) => Err(StreamReadError::EndOfStream),
            },
        }
    }
}

#[derive(Default)]
struct RecordingWriter {
    written: Mutex<Vec<(String, Bytes)>>,
}

impl RecordingWriter {
    fn written(&self) -> Vec<(String, Bytes)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStreamWriter for RecordingWriter {
    async fn write_message(&self, key: &str, payload: Bytes) -> DomainResult<()> {
        self.written
            .lock()
            .unwrap()
            .push((key.to_string(), payload));
        Ok(())
    }
}

// In-memory store that hands out sequential ids
#[derive(Default)]
struct InMemoryEventApi {
    next_id: AtomicUsize,
    locations: Mutex<Vec<LocationEventCreateRequest>>,
}

#[async_trait]
impl EventManagementApi for InMemoryEventApi {
    async fn create_location_event(
        &self,
        request: LocationEventCreateRequest,
    ) -> DomainResult<LocationEvent> {
        tokio::task::yield_now().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.locations.lock().unwrap().push(request.clone());
        Ok(LocationEvent {
            id,
            event: request.event,
            latitude: request.latitude,
            longitude: request.longitude,
            elevation: request.elevation,
        })
    }

    async fn create_measurement_event(
        &self,
        request: MeasurementEventCreateRequest,
    ) -> DomainResult<MeasurementEvent> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        Ok(MeasurementEvent {
            id,
            event: request.event,
            name: request.name,
            value: request.value,
            classifier: request.classifier,
        })
    }
}

struct Pipeline {
    manager: LifecycleManager<EventPersistenceProcessor>,
    input: Option<flume::Sender<StreamMessage>>,
    reads: Arc<AtomicUsize>,
    persisted: Arc<RecordingWriter>,
    failed: Arc<RecordingWriter>,
    ctx: CancellationToken,
}

impl Pipeline {
    fn new(api: Arc<dyn EventManagementApi>, config: EventPersistenceConfig) -> Self {
        let handlers = HandlerRegistry::for_event_types(api, &[EventType::Location]).unwrap();
        Self::with_handlers(handlers, config)
    }

    fn with_handlers(handlers: HandlerRegistry, config: EventPersistenceConfig) -> Self {
        let (input, messages) = flume::unbounded();
        let reads = Arc::new(AtomicUsize::new(0));
        let persisted = Arc::new(RecordingWriter::default());
        let failed = Arc::new(RecordingWriter::default());

        let processor = EventPersistenceProcessor::new(
            config,
            Box::new(ChannelReader {
                messages,
                reads: reads.clone(),
            }),
            persisted.clone(),
            failed.clone(),
            Arc::new(handlers),
        );

        Self {
            manager: LifecycleManager::new(processor),
            input: Some(input),
            reads,
            persisted,
            failed,
            ctx: CancellationToken::new(),
        }
    }

    fn send(&self, message: StreamMessage) {
        self.input.as_ref().unwrap().send(message).unwrap();
    }

    async fn start(&mut self) {
        self.manager.initialize(&self.ctx).await.unwrap();
        self.manager.start(&self.ctx).await.unwrap();
    }

    /// Close the input, wait for the reader to finish and drain everything
    async fn run_to_end(&mut self) {
        self.input = None;
        let reader_done = self.manager.component().reader_done();
        timeout(Duration::from_secs(5), reader_done.cancelled())
            .await
            .expect("reader did not reach end of stream");
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        timeout(Duration::from_secs(5), self.manager.stop(&self.ctx))
            .await
            .expect("stop timed out")
            .unwrap();
        self.manager.terminate(&self.ctx).await.unwrap();
    }
}

fn resolved(event_type: EventType, payload: EventPayload) -> ResolvedEvent {
    ResolvedEvent {
        source: "device-registry".to_string(),
        alt_id: Some("alt-1".to_string()),
        source_device_id: 1,
        target_device_id: Some(2),
        assignment_id: Some(9),
        relationships: RelationshipIds {
            customer_id: Some(4),
            ..Default::default()
        },
        event_type,
        occurred_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        processed_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap(),
        payload,
    }
}

fn location(lat: &str, lon: &str, elevation: Option<&str>) -> LocationEntry {
    LocationEntry {
        latitude: Some(lat.to_string()),
        longitude: Some(lon.to_string()),
        elevation: elevation.map(str::to_string),
    }
}

fn message(event: &ResolvedEvent) -> StreamMessage {
    StreamMessage::new(event.device_id().to_string(), encode_resolved_event(event))
}

#[tokio::test]
async fn test_location_event_is_persisted_and_published() {
    let mut api = MockEventManagementApi::new();
    api.expect_create_location_event()
        .withf(|req: &LocationEventCreateRequest| {
            req.event.device_id == 2
                && req.event.event_type == EventType::Location
                && req.latitude == Some(33.749)
                && req.longitude == Some(-84.388)
                && req.elevation == Some(738.0)
        })
        .times(1)
        .returning(|req| {
            Ok(LocationEvent {
                id: 11,
                event: req.event,
                latitude: req.latitude,
                longitude: req.longitude,
                elevation: req.elevation,
            })
        });

    let mut pipeline = Pipeline::new(Arc::new(api), EventPersistenceConfig::default());
    pipeline.start().await;
    pipeline.send(message(&resolved(
        EventType::Location,
        EventPayload::Locations(vec![location("33.7490", "-84.3880", Some("738"))]),
    )));
    pipeline.run_to_end().await;

    let persisted = pipeline.persisted.written();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].0, "2");
    let record = decode_persisted_event(&persisted[0].1).unwrap();
    assert_eq!(record.id(), 11);
    assert_eq!(record.device_id(), 2);
    assert!(pipeline.failed.written().is_empty());
    assert_eq!(pipeline.manager.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_every_entry_yields_one_persisted_outcome() {
    let api = Arc::new(InMemoryEventApi::default());
    let mut pipeline = Pipeline::new(api.clone(), EventPersistenceConfig::default());
    pipeline.start().await;

    pipeline.send(message(&resolved(
        EventType::Location,
        EventPayload::Locations(vec![
            location("1.0", "2.0", None),
            location("3.0", "4.0", None),
            location("5.0", "6.0", Some("7.5")),
        ]),
    )));
    pipeline.run_to_end().await;

    assert_eq!(pipeline.persisted.written().len(), 3);
    assert_eq!(api.locations.lock().unwrap().len(), 3);
    assert!(pipeline.failed.written().is_empty());
}

#[tokio::test]
async fn test_malformed_message_is_published_as_invalid() {
    let mut pipeline = Pipeline::new(
        Arc::new(MockEventManagementApi::new()),
        EventPersistenceConfig::default(),
    );
    pipeline.start().await;
    pipeline.send(StreamMessage::new("5", Bytes::from_static(b"\x08\xff\xff\xff")));
    pipeline.run_to_end().await;

    let failed = pipeline.failed.written();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "1");
    let failure = decode_failed_event(&failed[0].1).unwrap();
    assert_eq!(failure.reason, FailureReason::Invalid);
    assert_eq!(failure.message, INVALID_EVENT_MESSAGE);
    assert_eq!(failure.payload.as_ref(), b"\x08\xff\xff\xff");
    assert!(pipeline.persisted.written().is_empty());
}

#[tokio::test]
async fn test_store_failure_publishes_original_event() {
    let mut api = MockEventManagementApi::new();
    api.expect_create_location_event()
        .times(1)
        .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("connection refused"))));

    let event = resolved(
        EventType::Location,
        EventPayload::Locations(vec![location("10", "20", None)]),
    );
    let mut pipeline = Pipeline::new(Arc::new(api), EventPersistenceConfig::default());
    pipeline.start().await;
    pipeline.send(message(&event));
    pipeline.run_to_end().await;

    let failed = pipeline.failed.written();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "2");
    let failure = decode_failed_event(&failed[0].1).unwrap();
    assert_eq!(failure.reason, FailureReason::PersistenceError);
    assert_eq!(failure.message, FAILED_EVENT_MESSAGE);
    assert_eq!(failure.functional_area, "event-management");
    assert!(failure.error.contains("connection refused"));
    assert_eq!(decode_resolved_event(&failure.payload).unwrap(), event);
    assert!(pipeline.persisted.written().is_empty());
}

#[tokio::test]
async fn test_unparseable_entry_persists_nothing() {
    let api = Arc::new(InMemoryEventApi::default());
    let mut pipeline = Pipeline::new(api.clone(), EventPersistenceConfig::default());
    pipeline.start().await;
    pipeline.send(message(&resolved(
        EventType::Location,
        EventPayload::Locations(vec![location("1.0", "2.0", None), location("north", "2.0", None)]),
    )));
    pipeline.run_to_end().await;

    assert!(api.locations.lock().unwrap().is_empty());
    let failed = pipeline.failed.written();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        decode_failed_event(&failed[0].1).unwrap().reason,
        FailureReason::InvalidField
    );
}

#[tokio::test]
async fn test_measurement_is_unhandled_by_default() {
    let mut pipeline = Pipeline::new(
        Arc::new(MockEventManagementApi::new()),
        EventPersistenceConfig::default(),
    );
    pipeline.start().await;
    pipeline.send(message(&resolved(
        EventType::Measurement,
        EventPayload::Measurements(vec![MeasurementEntry {
            name: "temperature".to_string(),
            value: "21.5".to_string(),
            classifier: None,
        }]),
    )));
    pipeline.run_to_end().await;

    let failed = pipeline.failed.written();
    assert_eq!(failed.len(), 1);
    let failure = decode_failed_event(&failed[0].1).unwrap();
    assert_eq!(failure.reason, FailureReason::UnhandledEventType);
    assert!(failure.reason.is_persistence_class());
    assert_eq!(failure.error, "unhandled event type in persistence: Measurement");
}

#[tokio::test]
async fn test_measurement_handler_when_registered() {
    let api: Arc<dyn EventManagementApi> = Arc::new(InMemoryEventApi::default());
    let handlers =
        HandlerRegistry::for_event_types(api, &[EventType::Location, EventType::Measurement])
            .unwrap();
    let mut pipeline = Pipeline::with_handlers(handlers, EventPersistenceConfig::default());
    pipeline.start().await;
    pipeline.send(message(&resolved(
        EventType::Measurement,
        EventPayload::Measurements(vec![MeasurementEntry {
            name: "temperature".to_string(),
            value: "21.5".to_string(),
            classifier: Some("celsius".to_string()),
        }]),
    )));
    pipeline.run_to_end().await;

    let persisted = pipeline.persisted.written();
    assert_eq!(persisted.len(), 1);
    assert_eq!(decode_persisted_event(&persisted[0].1).unwrap().device_id(), 2);
}

#[tokio::test]
async fn test_small_queues_apply_backpressure_without_loss() {
    let api = Arc::new(InMemoryEventApi::default());
    let config = EventPersistenceConfig {
        worker_count: 2,
        inbound_capacity: 1,
        persisted_capacity: 1,
        failed_capacity: 1,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(api.clone(), config);
    pipeline.start().await;

    for i in 0..200 {
        if i % 10 == 0 {
            pipeline.send(StreamMessage::new("0", Bytes::from_static(b"\xff")));
        } else {
            pipeline.send(message(&resolved(
                EventType::Location,
                EventPayload::Locations(vec![location("1", "1", None)]),
            )));
        }
    }
    pipeline.run_to_end().await;

    assert_eq!(pipeline.reads.load(Ordering::SeqCst), 200);
    assert_eq!(pipeline.persisted.written().len(), 180);
    assert_eq!(pipeline.failed.written().len(), 20);
}

#[tokio::test]
async fn test_stop_drains_everything_read_before_shutdown() {
    let api = Arc::new(InMemoryEventApi::default());
    let mut pipeline = Pipeline::new(api.clone(), EventPersistenceConfig::default());
    pipeline.start().await;

    for _ in 0..50 {
        pipeline.send(message(&resolved(
            EventType::Location,
            EventPayload::Locations(vec![location("1", "1", None)]),
        )));
    }
    tokio::task::yield_now().await;

    // input stays open; only stop ends intake
    pipeline.shutdown().await;

    let reads = pipeline.reads.load(Ordering::SeqCst);
    assert_eq!(pipeline.persisted.written().len(), reads);
    assert_eq!(api.locations.lock().unwrap().len(), reads);
    assert_eq!(pipeline.manager.state(), LifecycleState::Terminated);

    // the reader is gone, so late input is refused and never read
    for _ in 0..5 {
        let late = message(&resolved(
            EventType::Location,
            EventPayload::Locations(vec![location("2", "2", None)]),
        ));
        let _ = pipeline.input.as_ref().unwrap().send(late);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pipeline.reads.load(Ordering::SeqCst), reads);
    assert_eq!(pipeline.persisted.written().len(), reads);
}

#[tokio::test]
async fn test_store_failure_on_second_entry_reports_once() {
    let mut api = MockEventManagementApi::new();
    let mut seq = mockall::Sequence::new();
    api.expect_create_location_event()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|req| {
            Ok(LocationEvent {
                id: 1,
                event: req.event,
                latitude: req.latitude,
                longitude: req.longitude,
                elevation: req.elevation,
            })
        });
    api.expect_create_location_event()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("disk full"))));

    let event = resolved(
        EventType::Location,
        EventPayload::Locations(vec![location("1", "1", None), location("2", "2", None)]),
    );
    let mut pipeline = Pipeline::new(Arc::new(api), EventPersistenceConfig::default());
    pipeline.start().await;
    pipeline.send(message(&event));
    pipeline.run_to_end().await;

    let failed = pipeline.failed.written();
    assert_eq!(failed.len(), 1);
    let failure = decode_failed_event(&failed[0].1).unwrap();
    assert_eq!(failure.reason, FailureReason::PersistenceError);
    assert_eq!(decode_resolved_event(&failure.payload).unwrap(), event);
    assert!(pipeline.persisted.written().is_empty());
}

#[tokio::test]
async fn test_start_before_initialize_is_rejected() {
    let mut pipeline = Pipeline::new(
        Arc::new(MockEventManagementApi::new()),
        EventPersistenceConfig::default(),
    );

    let err = pipeline.manager.start(&pipeline.ctx).await.unwrap_err();

    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    assert_eq!(pipeline.manager.state(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_invalid_config_fails_initialize() {
    let mut pipeline = Pipeline::new(
        Arc::new(MockEventManagementApi::new()),
        EventPersistenceConfig {
            inbound_capacity: 0,
            ..Default::default()
        },
    );

    let err = pipeline.manager.initialize(&pipeline.ctx).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Stage { .. }));
    assert_eq!(pipeline.manager.state(), LifecycleState::Uninitialized);
}

#[test]
fn test_event_fields_survive_projection() {
    let event = resolved(EventType::Location, EventPayload::Locations(vec![]));
    let projected: Event = event.to_event();

    assert_eq!(projected.device_id, 2);
    assert_eq!(projected.assignment_id, Some(9));
    assert_eq!(projected.relationships.customer_id, Some(4));
}
