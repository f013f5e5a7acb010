use crate::domain::{
    DomainError, DomainResult, Event, EventManagementApi, LocationEvent,
    LocationEventCreateRequest, MeasurementEvent, MeasurementEventCreateRequest,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use deadpool_postgres::Transaction;
use tracing::debug;

fn to_db_id(field: &'static str, value: u64) -> DomainResult<i64> {
    i64::try_from(value).map_err(|_| DomainError::IdentifierOutOfRange { field, value })
}

fn to_db_opt_id(field: &'static str, value: Option<u64>) -> DomainResult<Option<i64>> {
    value.map(|v| to_db_id(field, v)).transpose()
}

/// Canonical event columns bound as SQL parameters
struct EventRow {
    device_id: i64,
    event_type: String,
    assignment_id: Option<i64>,
    rel_device_id: Option<i64>,
    device_group_id: Option<i64>,
    customer_id: Option<i64>,
    customer_group_id: Option<i64>,
    area_id: Option<i64>,
    area_group_id: Option<i64>,
    asset_id: Option<i64>,
    asset_group_id: Option<i64>,
}

impl EventRow {
    fn from_event(event: &Event) -> DomainResult<Self> {
        let rel = &event.relationships;
        Ok(Self {
            device_id: to_db_id("device_id", event.device_id)?,
            event_type: event.event_type.to_string(),
            assignment_id: to_db_opt_id("assignment_id", event.assignment_id)?,
            rel_device_id: to_db_opt_id("rel_device_id", rel.device_id)?,
            device_group_id: to_db_opt_id("device_group_id", rel.device_group_id)?,
            customer_id: to_db_opt_id("customer_id", rel.customer_id)?,
            customer_group_id: to_db_opt_id("customer_group_id", rel.customer_group_id)?,
            area_id: to_db_opt_id("area_id", rel.area_id)?,
            area_group_id: to_db_opt_id("area_group_id", rel.area_group_id)?,
            asset_id: to_db_opt_id("asset_id", rel.asset_id)?,
            asset_group_id: to_db_opt_id("asset_group_id", rel.asset_group_id)?,
        })
    }
}

/// TimescaleDB-backed implementation of the event persistence API
///
/// Every create call writes the canonical `events` row and the subtype row in
/// one transaction. Several subtype rows may share one canonical row, so the
/// canonical insert ignores key conflicts.
#[derive(Clone)]
pub struct PostgresEventRepository {
    client: PostgresClient,
}

impl PostgresEventRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn insert_event(tx: &Transaction<'_>, event: &Event, row: &EventRow) -> DomainResult<()> {
        tx.execute(
            "INSERT INTO events (device_id, event_type, occurred_time, source, alt_id, assignment_id,
                rel_device_id, device_group_id, customer_id, customer_group_id, area_id, area_group_id,
                asset_id, asset_group_id, processed_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (device_id, event_type, occurred_time) DO NOTHING",
            &[
                &row.device_id,
                &row.event_type,
                &event.occurred_time,
                &event.source,
                &event.alt_id,
                &row.assignment_id,
                &row.rel_device_id,
                &row.device_group_id,
                &row.customer_id,
                &row.customer_group_id,
                &row.area_id,
                &row.area_group_id,
                &row.asset_id,
                &row.asset_group_id,
                &event.processed_time,
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(())
    }
}

#[async_trait]
impl EventManagementApi for PostgresEventRepository {
    async fn create_location_event(
        &self,
        request: LocationEventCreateRequest,
    ) -> DomainResult<LocationEvent> {
        debug!(
            device_id = request.event.device_id,
            occurred_time = %request.event.occurred_time,
            "Creating location event in database"
        );

        let row = EventRow::from_event(&request.event)?;

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Self::insert_event(&tx, &request.event, &row).await?;

        let inserted = tx
            .query_one(
                "INSERT INTO location_events (device_id, event_type, occurred_time, latitude, longitude, elevation)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &row.device_id,
                    &row.event_type,
                    &request.event.occurred_time,
                    &request.latitude,
                    &request.longitude,
                    &request.elevation,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let id: i64 = inserted.get("id");
        debug!(id, device_id = request.event.device_id, "Location event created in database");

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
        debug!(
            device_id = request.event.device_id,
            name = %request.name,
            "Creating measurement event in database"
        );

        let row = EventRow::from_event(&request.event)?;

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Self::insert_event(&tx, &request.event, &row).await?;

        let inserted = tx
            .query_one(
                "INSERT INTO measurement_events (device_id, event_type, occurred_time, name, value, classifier)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &row.device_id,
                    &row.event_type,
                    &request.event.occurred_time,
                    &request.name,
                    &request.value,
                    &request.classifier,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let id: i64 = inserted.get("id");
        debug!(id, device_id = request.event.device_id, "Measurement event created in database");

        Ok(MeasurementEvent {
            id,
            event: request.event,
            name: request.name,
            value: request.value,
            classifier: request.classifier,
        })
    }
}
