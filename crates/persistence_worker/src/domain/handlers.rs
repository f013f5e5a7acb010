use crate::domain::error::{PersistenceError, ProcessorError};
use async_trait::async_trait;
use common::domain::{
    DomainResult, Event, EventManagementApi, EventPayload, EventType, LocationEntry,
    LocationEventCreateRequest, MeasurementEntry, MeasurementEventCreateRequest, PersistedEvent,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Persists every entry of one event type's payload
#[async_trait]
pub trait EventPersistenceHandler: Send + Sync {
    fn event_type(&self) -> EventType;

    /// Persist all payload entries; records come back in entry order
    ///
    /// Any failure aborts the whole payload and is reported once.
    async fn persist(
        &self,
        ctx: &CancellationToken,
        event: Event,
        payload: &EventPayload,
    ) -> Result<Vec<PersistedEvent>, PersistenceError>;
}

/// Run a store call unless the token is cancelled first
async fn cancellable<T>(
    ctx: &CancellationToken,
    call: impl Future<Output = DomainResult<T>>,
) -> Result<T, PersistenceError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(PersistenceError::Cancelled),
        result = call => result.map_err(PersistenceError::Store),
    }
}

fn parse_decimal(field: &'static str, value: &str) -> Result<f64, PersistenceError> {
    value
        .parse::<f64>()
        .map_err(|source| PersistenceError::InvalidField {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_nullable_decimal(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<f64>, PersistenceError> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

fn location_request(
    event: &Event,
    entry: &LocationEntry,
) -> Result<LocationEventCreateRequest, PersistenceError> {
    Ok(LocationEventCreateRequest {
        event: event.clone(),
        latitude: parse_nullable_decimal("latitude", entry.latitude.as_deref())?,
        longitude: parse_nullable_decimal("longitude", entry.longitude.as_deref())?,
        elevation: parse_nullable_decimal("elevation", entry.elevation.as_deref())?,
    })
}

fn measurement_request(
    event: &Event,
    entry: &MeasurementEntry,
) -> Result<MeasurementEventCreateRequest, PersistenceError> {
    Ok(MeasurementEventCreateRequest {
        event: event.clone(),
        name: entry.name.clone(),
        value: parse_decimal("value", &entry.value)?,
        classifier: entry.classifier.clone(),
    })
}

pub struct LocationEventHandler {
    api: Arc<dyn EventManagementApi>,
}

impl LocationEventHandler {
    pub fn new(api: Arc<dyn EventManagementApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EventPersistenceHandler for LocationEventHandler {
    fn event_type(&self) -> EventType {
        EventType::Location
    }

    async fn persist(
        &self,
        ctx: &CancellationToken,
        event: Event,
        payload: &EventPayload,
    ) -> Result<Vec<PersistedEvent>, PersistenceError> {
        let EventPayload::Locations(entries) = payload else {
            return Err(PersistenceError::PayloadMismatch {
                expected: EventType::Location,
            });
        };

        // parse everything up front so a bad entry stores nothing
        let requests = entries
            .iter()
            .map(|entry| location_request(&event, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut persisted = Vec::with_capacity(requests.len());
        for request in requests {
            let created = cancellable(ctx, self.api.create_location_event(request)).await?;
            debug!(id = created.id, device_id = event.device_id, "persisted location entry");
            persisted.push(PersistedEvent::Location(created));
        }
        Ok(persisted)
    }
}

pub struct MeasurementEventHandler {
    api: Arc<dyn EventManagementApi>,
}

impl MeasurementEventHandler {
    pub fn new(api: Arc<dyn EventManagementApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EventPersistenceHandler for MeasurementEventHandler {
    fn event_type(&self) -> EventType {
        EventType::Measurement
    }

    async fn persist(
        &self,
        ctx: &CancellationToken,
        event: Event,
        payload: &EventPayload,
    ) -> Result<Vec<PersistedEvent>, PersistenceError> {
        let EventPayload::Measurements(entries) = payload else {
            return Err(PersistenceError::PayloadMismatch {
                expected: EventType::Measurement,
            });
        };

        let requests = entries
            .iter()
            .map(|entry| measurement_request(&event, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut persisted = Vec::with_capacity(requests.len());
        for request in requests {
            let created = cancellable(ctx, self.api.create_measurement_event(request)).await?;
            debug!(id = created.id, name = %created.name, "persisted measurement entry");
            persisted.push(PersistedEvent::Measurement(created));
        }
        Ok(persisted)
    }
}

/// Maps event types to their persistence handler
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EventType, Arc<dyn EventPersistenceHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler for the same event type
    pub fn with_handler(mut self, handler: Arc<dyn EventPersistenceHandler>) -> Self {
        self.handlers.insert(handler.event_type(), handler);
        self
    }

    /// Registry with the built-in handlers for the given event types
    pub fn for_event_types(
        api: Arc<dyn EventManagementApi>,
        event_types: &[EventType],
    ) -> Result<Self, ProcessorError> {
        let mut registry = Self::new();
        for event_type in event_types {
            let handler: Arc<dyn EventPersistenceHandler> = match event_type {
                EventType::Location => Arc::new(LocationEventHandler::new(api.clone())),
                EventType::Measurement => Arc::new(MeasurementEventHandler::new(api.clone())),
                EventType::Alert | EventType::Unrecognized(_) => {
                    return Err(ProcessorError::NoHandlerForEventType(*event_type))
                }
            };
            registry = registry.with_handler(handler);
        }
        Ok(registry)
    }

    pub fn get(&self, event_type: EventType) -> Option<&Arc<dyn EventPersistenceHandler>> {
        self.handlers.get(&event_type)
    }

    pub fn contains(&self, event_type: EventType) -> bool {
        self.handlers.contains_key(&event_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Parse a comma-separated event type list such as `"location,measurement"`
pub fn parse_event_types(list: &str) -> Result<Vec<EventType>, ProcessorError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EventType>().map_err(ProcessorError::InvalidEventTypes))
        .collect()
}
