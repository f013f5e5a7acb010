use crate::domain::{
    parse_event_types, EventPersistenceConfig, EventPersistenceProcessor, HandlerRegistry,
};
use common::domain::EventManagementApi;
use common::nats::{NatsClient, NatsStreamReader, NatsStreamWriter};
use em_runner::{AppProcess, BoxedProcessFuture, LifecycleManager};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct PersistenceWorkerConfig {
    pub resolved_events_stream: String,
    pub resolved_events_subject: String,
    pub consumer_name: String,
    pub persisted_events_stream: String,
    pub failed_events_stream: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    /// Comma-separated event types that get a persistence handler
    pub persisted_event_types: String,
    pub pipeline: EventPersistenceConfig,
}

pub struct PersistenceWorker {
    processor: EventPersistenceProcessor,
}

impl PersistenceWorker {
    pub async fn new(
        api: Arc<dyn EventManagementApi>,
        nats_client: Arc<NatsClient>,
        config: PersistenceWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing event persistence module");

        let event_types = parse_event_types(&config.persisted_event_types)?;
        let handlers = HandlerRegistry::for_event_types(api, &event_types)?;
        info!(event_types = ?event_types, "registered persistence handlers");

        let reader = NatsStreamReader::new(
            nats_client.create_consumer_client(),
            &config.resolved_events_stream,
            &config.consumer_name,
            &config.resolved_events_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
        )
        .await?;

        let persisted_writer = Arc::new(NatsStreamWriter::new(
            nats_client.create_publisher_client(),
            config.persisted_events_stream.clone(),
        ));
        let failed_writer = Arc::new(NatsStreamWriter::new(
            nats_client.create_publisher_client(),
            config.failed_events_stream.clone(),
        ));

        let processor = EventPersistenceProcessor::new(
            config.pipeline,
            Box::new(reader),
            persisted_writer,
            failed_writer,
            Arc::new(handlers),
        );

        info!("Event persistence module initialized");

        Ok(Self { processor })
    }

    /// Runner process driving the processor through its whole lifecycle
    ///
    /// The runner token only ends intake. Persistence calls run under
    /// `worker_ctx` so in-flight writes finish while the pipeline drains.
    pub fn into_runner_process(self, worker_ctx: CancellationToken) -> AppProcess {
        let processor = self.processor;
        Box::new(move |ctx| -> BoxedProcessFuture {
            Box::pin(async move {
                let mut manager = LifecycleManager::new(processor);
                manager.initialize(&worker_ctx).await?;

                // a failed start releases its own resources
                manager.start(&worker_ctx).await?;

                let reader_done = manager.component().reader_done();
                tokio::select! {
                    _ = ctx.cancelled() => info!("shutdown requested, stopping event persistence"),
                    _ = reader_done.cancelled() => info!("resolved event input ended"),
                }

                manager.stop(&worker_ctx).await?;
                manager.terminate(&worker_ctx).await?;
                Ok::<(), anyhow::Error>(())
            })
        })
    }
}
