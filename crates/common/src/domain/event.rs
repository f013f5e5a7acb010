use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Kind of device event carried by a resolved event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Location,
    Measurement,
    Alert,
    /// Wire code this build has no name for; kept so it can be routed and replayed
    Unrecognized(i32),
}

impl EventType {
    /// Lowercase label used in configuration and error text
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Location => "location",
            EventType::Measurement => "measurement",
            EventType::Alert => "alert",
            EventType::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Location => f.write_str("Location"),
            EventType::Measurement => f.write_str("Measurement"),
            EventType::Alert => f.write_str("Alert"),
            EventType::Unrecognized(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "location" => Ok(EventType::Location),
            "measurement" => Ok(EventType::Measurement),
            "alert" => Ok(EventType::Alert),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// Ids of the entities an event was resolved against through its assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipIds {
    pub device_id: Option<u64>,
    pub device_group_id: Option<u64>,
    pub customer_id: Option<u64>,
    pub customer_group_id: Option<u64>,
    pub area_id: Option<u64>,
    pub area_group_id: Option<u64>,
    pub asset_id: Option<u64>,
    pub asset_group_id: Option<u64>,
}

/// Location entry as received; coordinates are decimal strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationEntry {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub elevation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementEntry {
    pub name: String,
    pub value: String,
    pub classifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEntry {
    pub alert_type: String,
    pub level: u32,
    pub message: String,
}

/// Type-tagged payload of a resolved event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Locations(Vec<LocationEntry>),
    Measurements(Vec<MeasurementEntry>),
    Alerts(Vec<AlertEntry>),
}

impl EventPayload {
    /// Event type implied by the payload variant
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Locations(_) => EventType::Location,
            EventPayload::Measurements(_) => EventType::Measurement,
            EventPayload::Alerts(_) => EventType::Alert,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EventPayload::Locations(entries) => entries.len(),
            EventPayload::Measurements(entries) => entries.len(),
            EventPayload::Alerts(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event with device and assignment references already resolved upstream
///
/// The payload variant is expected to match `event_type`. A mismatch is not
/// rejected at decode time; persistence reports it as a processing failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    pub source: String,
    pub alt_id: Option<String>,
    pub source_device_id: u64,
    pub target_device_id: Option<u64>,
    pub assignment_id: Option<u64>,
    pub relationships: RelationshipIds,
    pub event_type: EventType,
    pub occurred_time: DateTime<Utc>,
    pub processed_time: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ResolvedEvent {
    /// Device the event is stored against: the target device when present
    pub fn device_id(&self) -> u64 {
        self.target_device_id.unwrap_or(self.source_device_id)
    }

    /// Project into the store-bound canonical event
    pub fn to_event(&self) -> Event {
        Event {
            device_id: self.device_id(),
            event_type: self.event_type,
            occurred_time: self.occurred_time,
            source: self.source.clone(),
            alt_id: self.alt_id.clone(),
            assignment_id: self.assignment_id,
            relationships: self.relationships.clone(),
            processed_time: self.processed_time,
        }
    }
}

/// Canonical event row shared by every persisted event subtype
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub device_id: u64,
    pub event_type: EventType,
    pub occurred_time: DateTime<Utc>,
    pub source: String,
    pub alt_id: Option<String>,
    pub assignment_id: Option<u64>,
    pub relationships: RelationshipIds,
    pub processed_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationEventCreateRequest {
    pub event: Event,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationEvent {
    pub id: i64,
    pub event: Event,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEventCreateRequest {
    pub event: Event,
    pub name: String,
    pub value: f64,
    pub classifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEvent {
    pub id: i64,
    pub event: Event,
    pub name: String,
    pub value: f64,
    pub classifier: Option<String>,
}

/// Record created by the persistence API, published on the persisted stream
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedEvent {
    Location(LocationEvent),
    Measurement(MeasurementEvent),
}

impl PersistedEvent {
    pub fn event(&self) -> &Event {
        match self {
            PersistedEvent::Location(location) => &location.event,
            PersistedEvent::Measurement(measurement) => &measurement.event,
        }
    }

    pub fn device_id(&self) -> u64 {
        self.event().device_id
    }

    pub fn id(&self) -> i64 {
        match self {
            PersistedEvent::Location(location) => location.id,
            PersistedEvent::Measurement(measurement) => measurement.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolved(target_device_id: Option<u64>) -> ResolvedEvent {
        ResolvedEvent {
            source: "mqtt".to_string(),
            alt_id: Some("alt-1".to_string()),
            source_device_id: 10,
            target_device_id,
            assignment_id: Some(3),
            relationships: RelationshipIds {
                customer_id: Some(7),
                ..Default::default()
            },
            event_type: EventType::Location,
            occurred_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            processed_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap(),
            payload: EventPayload::Locations(vec![LocationEntry::default()]),
        }
    }

    #[test]
    fn test_device_id_prefers_target_device() {
        assert_eq!(resolved(Some(42)).device_id(), 42);
        assert_eq!(resolved(None).device_id(), 10);
    }

    #[test]
    fn test_to_event_copies_references() {
        let event = resolved(Some(42)).to_event();

        assert_eq!(event.device_id, 42);
        assert_eq!(event.event_type, EventType::Location);
        assert_eq!(event.alt_id.as_deref(), Some("alt-1"));
        assert_eq!(event.assignment_id, Some(3));
        assert_eq!(event.relationships.customer_id, Some(7));
    }

    #[test]
    fn test_event_type_parsing_is_case_insensitive() {
        assert_eq!("Location".parse::<EventType>().unwrap(), EventType::Location);
        assert_eq!(" measurement ".parse::<EventType>().unwrap(), EventType::Measurement);
        assert!("command".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_type_display_uses_type_name() {
        assert_eq!(EventType::Measurement.to_string(), "Measurement");
        assert_eq!(EventType::Location.label(), "location");
        assert_eq!(EventType::Unrecognized(4).to_string(), "4");
    }
}
