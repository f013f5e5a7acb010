use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use persistence_worker::domain::EventPersistenceConfig;
use persistence_worker::PersistenceWorkerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name attached to failed events produced by this service
    #[serde(default = "default_functional_area")]
    pub functional_area: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying resolved events
    #[serde(default = "default_resolved_events_stream")]
    pub resolved_events_stream: String,

    /// Subject filter for the resolved events consumer
    #[serde(default = "default_resolved_events_subject")]
    pub resolved_events_subject: String,

    /// JetStream stream receiving persisted event records
    #[serde(default = "default_persisted_events_stream")]
    pub persisted_events_stream: String,

    /// JetStream stream receiving failed events
    #[serde(default = "default_failed_events_stream")]
    pub failed_events_stream: String,

    /// Durable consumer name for resolved events
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Timeout for connecting to NATS at startup
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Pipeline configuration
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_queue_capacity")]
    pub inbound_queue_capacity: usize,

    #[serde(default = "default_queue_capacity")]
    pub persisted_queue_capacity: usize,

    #[serde(default = "default_queue_capacity")]
    pub failed_queue_capacity: usize,

    /// Upper bound on draining in-flight events at shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated event types to persist (location, measurement)
    #[serde(default = "default_persisted_event_types")]
    pub persisted_event_types: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // OpenTelemetry configuration
    /// Enable OpenTelemetry trace and log export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_functional_area() -> String {
    "event-management".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_resolved_events_stream() -> String {
    "resolved_events".to_string()
}

fn default_resolved_events_subject() -> String {
    "resolved_events.*".to_string()
}

fn default_persisted_events_stream() -> String {
    "persisted_events".to_string()
}

fn default_failed_events_stream() -> String {
    "failed_events".to_string()
}

fn default_consumer_name() -> String {
    "event-management-persistence".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_worker_count() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_persisted_event_types() -> String {
    "location".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "event_management".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_password() -> String {
    "postgres".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "event-management".to_string()
}

impl ServiceConfig {
    /// Load configuration from `EM_`-prefixed environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("EM"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }

    pub fn persistence_worker(&self) -> PersistenceWorkerConfig {
        PersistenceWorkerConfig {
            resolved_events_stream: self.resolved_events_stream.clone(),
            resolved_events_subject: self.resolved_events_subject.clone(),
            consumer_name: self.consumer_name.clone(),
            persisted_events_stream: self.persisted_events_stream.clone(),
            failed_events_stream: self.failed_events_stream.clone(),
            nats_batch_size: self.nats_batch_size,
            nats_batch_wait_secs: self.nats_batch_wait_secs,
            persisted_event_types: self.persisted_event_types.clone(),
            pipeline: EventPersistenceConfig {
                functional_area: self.functional_area.clone(),
                worker_count: self.worker_count,
                inbound_capacity: self.inbound_queue_capacity,
                persisted_capacity: self.persisted_queue_capacity,
                failed_capacity: self.failed_queue_capacity,
                shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            },
        }
    }
}
