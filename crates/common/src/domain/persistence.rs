use crate::domain::event::{
    LocationEvent, LocationEventCreateRequest, MeasurementEvent, MeasurementEventCreateRequest,
};
use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// Persistence API for typed device events
/// Infrastructure layer (e.g., the Postgres event repository) implements this trait
///
/// Each call stores the canonical event together with one subtype record.
/// Implementations must be safe to call from many workers at once.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventManagementApi: Send + Sync {
    /// Store a location event and return the created record
    async fn create_location_event(
        &self,
        request: LocationEventCreateRequest,
    ) -> DomainResult<LocationEvent>;

    /// Store a measurement event and return the created record
    async fn create_measurement_event(
        &self,
        request: MeasurementEventCreateRequest,
    ) -> DomainResult<MeasurementEvent>;
}
