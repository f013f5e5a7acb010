use bytes::Bytes;
use std::fmt;

/// Why an inbound message ended up on the failed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FailureReason {
    /// Inbound bytes could not be decoded into a resolved event
    Invalid = 1,
    /// The store rejected the write or the call was cancelled
    PersistenceError = 2,
    /// No persistence handler is registered for the event type
    UnhandledEventType = 3,
    /// A decimal-string field could not be parsed
    InvalidField = 4,
    /// Payload variant does not match the event type
    PayloadMismatch = 5,
}

impl FailureReason {
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(FailureReason::Invalid),
            2 => Some(FailureReason::PersistenceError),
            3 => Some(FailureReason::UnhandledEventType),
            4 => Some(FailureReason::InvalidField),
            5 => Some(FailureReason::PayloadMismatch),
            _ => None,
        }
    }

    /// True for every reason raised after a message decoded successfully
    pub fn is_persistence_class(&self) -> bool {
        !matches!(self, FailureReason::Invalid)
    }

    /// Message key used on the failed stream
    pub fn as_key(&self) -> String {
        self.code().to_string()
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::Invalid => "invalid",
            FailureReason::PersistenceError => "persistence_error",
            FailureReason::UnhandledEventType => "unhandled_event_type",
            FailureReason::InvalidField => "invalid_field",
            FailureReason::PayloadMismatch => "payload_mismatch",
        };
        f.write_str(name)
    }
}

/// Failure record published for replay or inspection
///
/// `payload` holds the original inbound bytes when decoding failed, otherwise
/// the re-encoded resolved event.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEvent {
    pub reason: FailureReason,
    pub functional_area: String,
    pub message: String,
    pub error: String,
    pub payload: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        for reason in [
            FailureReason::Invalid,
            FailureReason::PersistenceError,
            FailureReason::UnhandledEventType,
            FailureReason::InvalidField,
            FailureReason::PayloadMismatch,
        ] {
            assert_eq!(FailureReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(FailureReason::from_code(0), None);
        assert_eq!(FailureReason::Invalid.as_key(), "1");
    }

    #[test]
    fn test_only_invalid_is_outside_persistence_class() {
        assert!(!FailureReason::Invalid.is_persistence_class());
        assert!(FailureReason::PersistenceError.is_persistence_class());
        assert!(FailureReason::UnhandledEventType.is_persistence_class());
        assert!(FailureReason::InvalidField.is_persistence_class());
        assert!(FailureReason::PayloadMismatch.is_persistence_class());
    }
}
