mod config;

use common::domain::EventManagementApi;
use common::nats::NatsClient;
use common::postgres::{MigrationRunner, PostgresClient, PostgresEventRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use em_runner::Runner;
use persistence_worker::PersistenceWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting event-management service"
    );
    debug!("Configuration: {:?}", config);

    let (event_api, nats_client) = match initialize_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize dependencies: {:#}", e);
            std::process::exit(1);
        }
    };

    let persistence_worker = match PersistenceWorker::new(
        event_api,
        nats_client.clone(),
        config.persistence_worker(),
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize event persistence: {:#}", e);
            std::process::exit(1);
        }
    };

    // Owned by main so persistence outlives the runner's shutdown signal
    let worker_token = CancellationToken::new();

    let runner = Runner::new()
        .with_named_process(
            "event_persistence",
            persistence_worker.into_runner_process(worker_token.clone()),
        )
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                worker_token.cancel();
                nats_for_close.close().await;

                // Flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs + 5));

    runner.run().await;
}

async fn initialize_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<dyn EventManagementApi>, Arc<NatsClient>)> {
    info!("Initializing PostgreSQL...");
    let postgres_client = PostgresClient::from_config(&config.postgres())?;
    postgres_client.ping().await?;
    MigrationRunner::new(postgres_client.clone())
        .run_migrations()
        .await?;
    let event_api: Arc<dyn EventManagementApi> =
        Arc::new(PostgresEventRepository::new(postgres_client));

    info!("Initializing NATS...");
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    ensure_nats_streams(&nats_client, config).await?;

    Ok((event_api, nats_client))
}

async fn ensure_nats_streams(client: &NatsClient, config: &ServiceConfig) -> anyhow::Result<()> {
    client
        .ensure_stream(&config.resolved_events_stream, "Resolved device events")
        .await?;
    client
        .ensure_stream(&config.persisted_events_stream, "Persisted event records")
        .await?;
    client
        .ensure_stream(&config.failed_events_stream, "Events that failed persistence")
        .await?;
    Ok(())
}
