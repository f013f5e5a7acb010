use crate::domain::{
    AlertEntry, Event, EventPayload, EventType, FailedEvent, FailureReason, LocationEntry,
    LocationEvent, MeasurementEntry, MeasurementEvent, PersistedEvent, RelationshipIds,
    ResolvedEvent,
};
use crate::proto::messages::{
    persisted_event_message::Record, resolved_event_message::Payload, AlertEntryMessage,
    AlertsPayloadMessage, CanonicalEventMessage, EventTypeMessage, FailedEventMessage,
    LocationEntryMessage, LocationRecordMessage, LocationsPayloadMessage,
    MeasurementEntryMessage, MeasurementRecordMessage, MeasurementsPayloadMessage,
    PersistedEventMessage, RelationshipsMessage, ResolvedEventMessage,
};
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use prost::Message;
use prost_types::Timestamp;

/// Decode resolved event bytes into the domain type
pub fn decode_resolved_event(bytes: &[u8]) -> Result<ResolvedEvent> {
    let proto =
        ResolvedEventMessage::decode(bytes).context("failed to decode resolved event bytes")?;
    resolved_event_proto_to_domain(proto)
}

pub fn encode_resolved_event(event: &ResolvedEvent) -> Bytes {
    Bytes::from(resolved_event_domain_to_proto(event).encode_to_vec())
}

/// Convert protobuf ResolvedEvent to domain ResolvedEvent
pub fn resolved_event_proto_to_domain(proto: ResolvedEventMessage) -> Result<ResolvedEvent> {
    let event_type = event_type_proto_to_domain(proto.event_type)?;

    let occurred_time = timestamp_to_datetime(
        proto
            .occurred_time
            .ok_or_else(|| anyhow!("Missing occurred_time timestamp"))?,
    )?;
    let processed_time = timestamp_to_datetime(
        proto
            .processed_time
            .ok_or_else(|| anyhow!("Missing processed_time timestamp"))?,
    )?;

    let payload = match proto.payload.ok_or_else(|| anyhow!("Missing event payload"))? {
        Payload::Locations(locations) => EventPayload::Locations(
            locations
                .entries
                .into_iter()
                .map(|entry| LocationEntry {
                    latitude: entry.latitude,
                    longitude: entry.longitude,
                    elevation: entry.elevation,
                })
                .collect(),
        ),
        Payload::Measurements(measurements) => EventPayload::Measurements(
            measurements
                .entries
                .into_iter()
                .map(|entry| MeasurementEntry {
                    name: entry.name,
                    value: entry.value,
                    classifier: entry.classifier,
                })
                .collect(),
        ),
        Payload::Alerts(alerts) => EventPayload::Alerts(
            alerts
                .entries
                .into_iter()
                .map(|entry| AlertEntry {
                    alert_type: entry.alert_type,
                    level: entry.level,
                    message: entry.message,
                })
                .collect(),
        ),
    };

    Ok(ResolvedEvent {
        source: proto.source,
        alt_id: proto.alt_id,
        source_device_id: proto.source_device_id,
        target_device_id: proto.target_device_id,
        assignment_id: proto.assignment_id,
        relationships: proto
            .relationships
            .map(relationships_proto_to_domain)
            .unwrap_or_default(),
        event_type,
        occurred_time,
        processed_time,
        payload,
    })
}

/// Convert domain ResolvedEvent to protobuf ResolvedEvent
pub fn resolved_event_domain_to_proto(event: &ResolvedEvent) -> ResolvedEventMessage {
    let payload = match &event.payload {
        EventPayload::Locations(entries) => Payload::Locations(LocationsPayloadMessage {
            entries: entries
                .iter()
                .map(|entry| LocationEntryMessage {
                    latitude: entry.latitude.clone(),
                    longitude: entry.longitude.clone(),
                    elevation: entry.elevation.clone(),
                })
                .collect(),
        }),
        EventPayload::Measurements(entries) => Payload::Measurements(MeasurementsPayloadMessage {
            entries: entries
                .iter()
                .map(|entry| MeasurementEntryMessage {
                    name: entry.name.clone(),
                    value: entry.value.clone(),
                    classifier: entry.classifier.clone(),
                })
                .collect(),
        }),
        EventPayload::Alerts(entries) => Payload::Alerts(AlertsPayloadMessage {
            entries: entries
                .iter()
                .map(|entry| AlertEntryMessage {
                    alert_type: entry.alert_type.clone(),
                    level: entry.level,
                    message: entry.message.clone(),
                })
                .collect(),
        }),
    };

    ResolvedEventMessage {
        source: event.source.clone(),
        alt_id: event.alt_id.clone(),
        source_device_id: event.source_device_id,
        target_device_id: event.target_device_id,
        assignment_id: event.assignment_id,
        relationships: Some(relationships_domain_to_proto(&event.relationships)),
        event_type: event_type_domain_to_proto(event.event_type),
        occurred_time: Some(datetime_to_timestamp(&event.occurred_time)),
        processed_time: Some(datetime_to_timestamp(&event.processed_time)),
        payload: Some(payload),
    }
}

pub fn encode_failed_event(failed: &FailedEvent) -> Bytes {
    Bytes::from(failed_event_domain_to_proto(failed).encode_to_vec())
}

pub fn decode_failed_event(bytes: &[u8]) -> Result<FailedEvent> {
    let proto = FailedEventMessage::decode(bytes).context("failed to decode failed event bytes")?;
    failed_event_proto_to_domain(proto)
}

pub fn failed_event_domain_to_proto(failed: &FailedEvent) -> FailedEventMessage {
    FailedEventMessage {
        reason: failed.reason.code(),
        functional_area: failed.functional_area.clone(),
        message: failed.message.clone(),
        error: failed.error.clone(),
        payload: failed.payload.to_vec(),
    }
}

pub fn failed_event_proto_to_domain(proto: FailedEventMessage) -> Result<FailedEvent> {
    let reason = FailureReason::from_code(proto.reason)
        .ok_or_else(|| anyhow!("Unknown failure reason code: {}", proto.reason))?;

    Ok(FailedEvent {
        reason,
        functional_area: proto.functional_area,
        message: proto.message,
        error: proto.error,
        payload: Bytes::from(proto.payload),
    })
}

pub fn encode_persisted_event(persisted: &PersistedEvent) -> Bytes {
    Bytes::from(persisted_event_domain_to_proto(persisted).encode_to_vec())
}

pub fn decode_persisted_event(bytes: &[u8]) -> Result<PersistedEvent> {
    let proto =
        PersistedEventMessage::decode(bytes).context("failed to decode persisted event bytes")?;
    persisted_event_proto_to_domain(proto)
}

/// Convert domain PersistedEvent to protobuf PersistedEvent
pub fn persisted_event_domain_to_proto(persisted: &PersistedEvent) -> PersistedEventMessage {
    let record = match persisted {
        PersistedEvent::Location(location) => Record::Location(LocationRecordMessage {
            id: location.id,
            latitude: location.latitude,
            longitude: location.longitude,
            elevation: location.elevation,
        }),
        PersistedEvent::Measurement(measurement) => Record::Measurement(MeasurementRecordMessage {
            id: measurement.id,
            name: measurement.name.clone(),
            value: measurement.value,
            classifier: measurement.classifier.clone(),
        }),
    };

    PersistedEventMessage {
        event: Some(canonical_event_domain_to_proto(persisted.event())),
        record: Some(record),
    }
}

/// Convert protobuf PersistedEvent to domain PersistedEvent
pub fn persisted_event_proto_to_domain(proto: PersistedEventMessage) -> Result<PersistedEvent> {
    let event = canonical_event_proto_to_domain(
        proto
            .event
            .ok_or_else(|| anyhow!("Missing canonical event"))?,
    )?;

    match proto.record.ok_or_else(|| anyhow!("Missing persisted record"))? {
        Record::Location(location) => Ok(PersistedEvent::Location(LocationEvent {
            id: location.id,
            event,
            latitude: location.latitude,
            longitude: location.longitude,
            elevation: location.elevation,
        })),
        Record::Measurement(measurement) => Ok(PersistedEvent::Measurement(MeasurementEvent {
            id: measurement.id,
            event,
            name: measurement.name,
            value: measurement.value,
            classifier: measurement.classifier,
        })),
    }
}

fn canonical_event_domain_to_proto(event: &Event) -> CanonicalEventMessage {
    CanonicalEventMessage {
        device_id: event.device_id,
        event_type: event_type_domain_to_proto(event.event_type),
        occurred_time: Some(datetime_to_timestamp(&event.occurred_time)),
        source: event.source.clone(),
        alt_id: event.alt_id.clone(),
        assignment_id: event.assignment_id,
        relationships: Some(relationships_domain_to_proto(&event.relationships)),
        processed_time: Some(datetime_to_timestamp(&event.processed_time)),
    }
}

fn canonical_event_proto_to_domain(proto: CanonicalEventMessage) -> Result<Event> {
    Ok(Event {
        device_id: proto.device_id,
        event_type: event_type_proto_to_domain(proto.event_type)?,
        occurred_time: timestamp_to_datetime(
            proto
                .occurred_time
                .ok_or_else(|| anyhow!("Missing occurred_time timestamp"))?,
        )?,
        source: proto.source,
        alt_id: proto.alt_id,
        assignment_id: proto.assignment_id,
        relationships: proto
            .relationships
            .map(relationships_proto_to_domain)
            .unwrap_or_default(),
        processed_time: timestamp_to_datetime(
            proto
                .processed_time
                .ok_or_else(|| anyhow!("Missing processed_time timestamp"))?,
        )?,
    })
}

fn event_type_proto_to_domain(value: i32) -> Result<EventType> {
    match EventTypeMessage::try_from(value) {
        Ok(EventTypeMessage::Location) => Ok(EventType::Location),
        Ok(EventTypeMessage::Measurement) => Ok(EventType::Measurement),
        Ok(EventTypeMessage::Alert) => Ok(EventType::Alert),
        Ok(EventTypeMessage::Unspecified) => Err(anyhow!("Event type not specified")),
        // newer producers may send types this build has no handler for
        Err(_) => Ok(EventType::Unrecognized(value)),
    }
}

fn event_type_domain_to_proto(event_type: EventType) -> i32 {
    match event_type {
        EventType::Location => EventTypeMessage::Location as i32,
        EventType::Measurement => EventTypeMessage::Measurement as i32,
        EventType::Alert => EventTypeMessage::Alert as i32,
        EventType::Unrecognized(code) => code,
    }
}

fn relationships_proto_to_domain(proto: RelationshipsMessage) -> RelationshipIds {
    RelationshipIds {
        device_id: proto.device_id,
        device_group_id: proto.device_group_id,
        customer_id: proto.customer_id,
        customer_group_id: proto.customer_group_id,
        area_id: proto.area_id,
        area_group_id: proto.area_group_id,
        asset_id: proto.asset_id,
        asset_group_id: proto.asset_group_id,
    }
}

fn relationships_domain_to_proto(ids: &RelationshipIds) -> RelationshipsMessage {
    RelationshipsMessage {
        device_id: ids.device_id,
        device_group_id: ids.device_group_id,
        customer_id: ids.customer_id,
        customer_group_id: ids.customer_group_id,
        area_id: ids.area_id,
        area_group_id: ids.area_group_id,
        asset_id: ids.asset_id,
        asset_group_id: ids.asset_group_id,
    }
}

/// Convert protobuf Timestamp to chrono DateTime
fn timestamp_to_datetime(ts: Timestamp) -> Result<DateTime<Utc>> {
    use chrono::TimeZone;

    let nanos = u32::try_from(ts.nanos)
        .map_err(|_| anyhow!("Invalid timestamp nanos: {}", ts.nanos))?;

    Utc.timestamp_opt(ts.seconds, nanos)
        .single()
        .ok_or_else(|| {
            anyhow!(
                "Invalid timestamp: {} seconds, {} nanos",
                ts.seconds,
                ts.nanos
            )
        })
}

/// Convert chrono DateTime to protobuf Timestamp
fn datetime_to_timestamp(dt: &DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn location_event() -> ResolvedEvent {
        ResolvedEvent {
            source: "mqtt".to_string(),
            alt_id: None,
            source_device_id: 17,
            target_device_id: Some(21),
            assignment_id: Some(4),
            relationships: RelationshipIds {
                device_group_id: Some(2),
                asset_id: Some(9),
                ..Default::default()
            },
            event_type: EventType::Location,
            occurred_time: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            processed_time: Utc.timestamp_opt(1_714_552_201, 250_000_000).unwrap(),
            payload: EventPayload::Locations(vec![LocationEntry {
                latitude: Some("33.7490".to_string()),
                longitude: Some("-84.3880".to_string()),
                elevation: None,
            }]),
        }
    }

    #[test]
    fn test_resolved_event_survives_encoding() {
        let event = location_event();

        let decoded = decode_resolved_event(&encode_resolved_event(&event)).unwrap();

        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_resolved_event(b"not a protobuf");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_payload_is_rejected() {
        let mut proto = resolved_event_domain_to_proto(&location_event());
        proto.payload = None;

        let err = resolved_event_proto_to_domain(proto).unwrap_err();
        assert!(err.to_string().contains("Missing event payload"));
    }

    #[test]
    fn test_unspecified_event_type_is_rejected() {
        let mut proto = resolved_event_domain_to_proto(&location_event());
        proto.event_type = EventTypeMessage::Unspecified as i32;

        assert!(resolved_event_proto_to_domain(proto).is_err());
    }

    #[test]
    fn test_unknown_event_type_code_is_kept() {
        let mut proto = resolved_event_domain_to_proto(&location_event());
        proto.event_type = 4;

        let decoded = resolved_event_proto_to_domain(proto).unwrap();
        assert_eq!(decoded.event_type, EventType::Unrecognized(4));

        let reencoded = resolved_event_domain_to_proto(&decoded);
        assert_eq!(reencoded.event_type, 4);
    }

    #[test]
    fn test_mismatched_payload_still_decodes() {
        let mut event = location_event();
        event.event_type = EventType::Measurement;

        let decoded = decode_resolved_event(&encode_resolved_event(&event)).unwrap();

        assert_eq!(decoded.event_type, EventType::Measurement);
        assert_eq!(decoded.payload.event_type(), EventType::Location);
    }

    #[test]
    fn test_failed_event_keeps_raw_payload() {
        let failed = FailedEvent {
            reason: FailureReason::Invalid,
            functional_area: "event-management".to_string(),
            message: "message could not be parsed".to_string(),
            error: "bad wire type".to_string(),
            payload: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        };

        let decoded = decode_failed_event(&encode_failed_event(&failed)).unwrap();

        assert_eq!(decoded, failed);
    }

    #[test]
    fn test_persisted_location_record_encoding() {
        let persisted = PersistedEvent::Location(LocationEvent {
            id: 12,
            event: location_event().to_event(),
            latitude: Some(33.749),
            longitude: Some(-84.388),
            elevation: None,
        });

        let proto = persisted_event_domain_to_proto(&persisted);
        assert_eq!(proto.event.as_ref().map(|e| e.device_id), Some(21));

        let decoded = decode_persisted_event(&encode_persisted_event(&persisted)).unwrap();
        assert_eq!(decoded, persisted);
    }
}
