//! Protobuf wire messages for the event streams.
//!
//! Field tags are part of the wire contract with upstream producers and
//! downstream consumers; never renumber them.

use prost_types::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventTypeMessage {
    Unspecified = 0,
    Location = 1,
    Measurement = 2,
    Alert = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RelationshipsMessage {
    #[prost(uint64, optional, tag = "1")]
    pub device_id: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub device_group_id: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub customer_id: Option<u64>,
    #[prost(uint64, optional, tag = "4")]
    pub customer_group_id: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub area_id: Option<u64>,
    #[prost(uint64, optional, tag = "6")]
    pub area_group_id: Option<u64>,
    #[prost(uint64, optional, tag = "7")]
    pub asset_id: Option<u64>,
    #[prost(uint64, optional, tag = "8")]
    pub asset_group_id: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationEntryMessage {
    #[prost(string, optional, tag = "1")]
    pub latitude: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub longitude: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub elevation: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationsPayloadMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<LocationEntryMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeasurementEntryMessage {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
    #[prost(string, optional, tag = "3")]
    pub classifier: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeasurementsPayloadMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<MeasurementEntryMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AlertEntryMessage {
    #[prost(string, tag = "1")]
    pub alert_type: String,
    #[prost(uint32, tag = "2")]
    pub level: u32,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AlertsPayloadMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<AlertEntryMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResolvedEventMessage {
    #[prost(string, tag = "1")]
    pub source: String,
    #[prost(string, optional, tag = "2")]
    pub alt_id: Option<String>,
    #[prost(uint64, tag = "3")]
    pub source_device_id: u64,
    #[prost(uint64, optional, tag = "4")]
    pub target_device_id: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub assignment_id: Option<u64>,
    #[prost(message, optional, tag = "6")]
    pub relationships: Option<RelationshipsMessage>,
    #[prost(enumeration = "EventTypeMessage", tag = "7")]
    pub event_type: i32,
    #[prost(message, optional, tag = "8")]
    pub occurred_time: Option<Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub processed_time: Option<Timestamp>,
    #[prost(oneof = "resolved_event_message::Payload", tags = "10, 11, 12")]
    pub payload: Option<resolved_event_message::Payload>,
}

pub mod resolved_event_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        Locations(super::LocationsPayloadMessage),
        #[prost(message, tag = "11")]
        Measurements(super::MeasurementsPayloadMessage),
        #[prost(message, tag = "12")]
        Alerts(super::AlertsPayloadMessage),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FailedEventMessage {
    #[prost(uint32, tag = "1")]
    pub reason: u32,
    #[prost(string, tag = "2")]
    pub functional_area: String,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(string, tag = "4")]
    pub error: String,
    #[prost(bytes = "vec", tag = "5")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CanonicalEventMessage {
    #[prost(uint64, tag = "1")]
    pub device_id: u64,
    #[prost(enumeration = "EventTypeMessage", tag = "2")]
    pub event_type: i32,
    #[prost(message, optional, tag = "3")]
    pub occurred_time: Option<Timestamp>,
    #[prost(string, tag = "4")]
    pub source: String,
    #[prost(string, optional, tag = "5")]
    pub alt_id: Option<String>,
    #[prost(uint64, optional, tag = "6")]
    pub assignment_id: Option<u64>,
    #[prost(message, optional, tag = "7")]
    pub relationships: Option<RelationshipsMessage>,
    #[prost(message, optional, tag = "8")]
    pub processed_time: Option<Timestamp>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationRecordMessage {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(double, optional, tag = "2")]
    pub latitude: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub longitude: Option<f64>,
    #[prost(double, optional, tag = "4")]
    pub elevation: Option<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeasurementRecordMessage {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(double, tag = "3")]
    pub value: f64,
    #[prost(string, optional, tag = "4")]
    pub classifier: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PersistedEventMessage {
    #[prost(message, optional, tag = "1")]
    pub event: Option<CanonicalEventMessage>,
    #[prost(oneof = "persisted_event_message::Record", tags = "2, 3")]
    pub record: Option<persisted_event_message::Record>,
}

pub mod persisted_event_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Record {
        #[prost(message, tag = "2")]
        Location(super::LocationRecordMessage),
        #[prost(message, tag = "3")]
        Measurement(super::MeasurementRecordMessage),
    }
}
