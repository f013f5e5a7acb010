use common::domain::{DomainError, EventType, FailureReason};
use std::num::ParseFloatError;
use thiserror::Error;

/// Failure to persist a decoded event
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("unhandled event type in persistence: {0}")]
    UnhandledEventType(EventType),

    #[error("non-{} payload in {} event", .expected.label(), .expected.label())]
    PayloadMismatch { expected: EventType },

    #[error("invalid {field} value '{value}': {source}")]
    InvalidField {
        field: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("persistence cancelled before completion")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] DomainError),
}

impl PersistenceError {
    /// Failure reason reported on the failed stream
    pub fn reason(&self) -> FailureReason {
        match self {
            PersistenceError::UnhandledEventType(_) => FailureReason::UnhandledEventType,
            PersistenceError::PayloadMismatch { .. } => FailureReason::PayloadMismatch,
            PersistenceError::InvalidField { .. } => FailureReason::InvalidField,
            PersistenceError::Cancelled | PersistenceError::Store(_) => {
                FailureReason::PersistenceError
            }
        }
    }
}

/// Processor setup failures; these are fatal
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("stream reader was already consumed by a previous start")]
    ReaderUnavailable,

    #[error("no persistence handler exists for event type {0}")]
    NoHandlerForEventType(EventType),

    #[error("invalid persisted event type list: {0}")]
    InvalidEventTypes(String),
}
