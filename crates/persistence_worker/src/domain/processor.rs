use crate::domain::error::ProcessorError;
use crate::domain::handlers::HandlerRegistry;
use crate::domain::outbound::{run_failed_publisher, run_persisted_publisher, run_read_loop};
use crate::domain::outcome::OutcomeSink;
use crate::domain::worker::EventPersistenceWorker;
use async_trait::async_trait;
use common::domain::{EventStreamReader, EventStreamWriter, FailedEvent, PersistedEvent, StreamMessage};
use em_runner::LifecycleComponent;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sizing for the persistence pipeline
#[derive(Debug, Clone)]
pub struct EventPersistenceConfig {
    pub functional_area: String,
    pub worker_count: usize,
    pub inbound_capacity: usize,
    pub persisted_capacity: usize,
    pub failed_capacity: usize,
    /// Upper bound on draining the pipeline during stop
    pub shutdown_timeout: Duration,
}

impl Default for EventPersistenceConfig {
    fn default() -> Self {
        Self {
            functional_area: "event-management".to_string(),
            worker_count: 5,
            inbound_capacity: 100,
            persisted_capacity: 100,
            failed_capacity: 100,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl EventPersistenceConfig {
    fn validate(&self) -> Result<(), ProcessorError> {
        if self.worker_count == 0 {
            return Err(ProcessorError::ZeroCapacity("worker_count"));
        }
        if self.inbound_capacity == 0 {
            return Err(ProcessorError::ZeroCapacity("inbound_capacity"));
        }
        if self.persisted_capacity == 0 {
            return Err(ProcessorError::ZeroCapacity("persisted_capacity"));
        }
        if self.failed_capacity == 0 {
            return Err(ProcessorError::ZeroCapacity("failed_capacity"));
        }
        Ok(())
    }
}

/// Reads resolved events, persists them on a worker pool and publishes outcomes
///
/// ```text
/// reader --> [inbound] --> worker x N --+--> [persisted] --> persisted writer
///                                       +--> [failed]    --> failed writer
/// ```
///
/// Each queue is closed by dropping its last sender: the read loop owns the
/// inbound sender and the workers own the outcome senders. Stop therefore
/// drains downstream in order and nothing accepted is lost.
pub struct EventPersistenceProcessor {
    name: String,
    config: EventPersistenceConfig,
    reader: Option<Box<dyn EventStreamReader>>,
    persisted_writer: Arc<dyn EventStreamWriter>,
    failed_writer: Arc<dyn EventStreamWriter>,
    handlers: Arc<HandlerRegistry>,

    inbound_tx: Option<flume::Sender<StreamMessage>>,
    persisted_rx: Option<flume::Receiver<PersistedEvent>>,
    failed_rx: Option<flume::Receiver<FailedEvent>>,

    reader_task: JoinSet<()>,
    workers: JoinSet<()>,
    publishers: JoinSet<()>,
    read_token: CancellationToken,
    reader_done: CancellationToken,
}

impl EventPersistenceProcessor {
    pub fn new(
        config: EventPersistenceConfig,
        reader: Box<dyn EventStreamReader>,
        persisted_writer: Arc<dyn EventStreamWriter>,
        failed_writer: Arc<dyn EventStreamWriter>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            name: format!("{}-event-persist-proc", config.functional_area),
            config,
            reader: Some(reader),
            persisted_writer,
            failed_writer,
            handlers,
            inbound_tx: None,
            persisted_rx: None,
            failed_rx: None,
            reader_task: JoinSet::new(),
            workers: JoinSet::new(),
            publishers: JoinSet::new(),
            read_token: CancellationToken::new(),
            reader_done: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &EventPersistenceConfig {
        &self.config
    }

    /// Cancelled once the read loop has exited for any reason
    pub fn reader_done(&self) -> CancellationToken {
        self.reader_done.clone()
    }

    async fn drain(&mut self) {
        join_all("read loop", &mut self.reader_task).await;
        join_all("persistence worker", &mut self.workers).await;
        join_all("outcome publisher", &mut self.publishers).await;
    }

    fn abort_all(&mut self) {
        self.reader_task.abort_all();
        self.workers.abort_all();
        self.publishers.abort_all();
    }

    /// Drop the queues and tear down every task without draining
    async fn release(&mut self) {
        self.read_token.cancel();
        self.inbound_tx = None;
        self.persisted_rx = None;
        self.failed_rx = None;

        self.abort_all();
        self.drain().await;
    }
}

async fn join_all(kind: &str, tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(()) => debug!(task = kind, "task finished"),
            Err(e) if e.is_cancelled() => debug!(task = kind, "task aborted"),
            Err(e) => error!(task = kind, error = %e, "task panicked"),
        }
    }
}

#[async_trait]
impl LifecycleComponent for EventPersistenceProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    /// Create the queues and start the worker pool
    async fn execute_initialize(&mut self, ctx: &CancellationToken) -> anyhow::Result<()> {
        self.config.validate()?;

        let (inbound_tx, inbound_rx) = flume::bounded(self.config.inbound_capacity);
        let (persisted_tx, persisted_rx) = flume::bounded(self.config.persisted_capacity);
        let (failed_tx, failed_rx) = flume::bounded(self.config.failed_capacity);

        let sink = OutcomeSink::new(self.config.functional_area.clone(), persisted_tx, failed_tx);
        for worker_id in 0..self.config.worker_count {
            let worker = EventPersistenceWorker::new(
                worker_id,
                inbound_rx.clone(),
                self.handlers.clone(),
                sink.clone(),
            );
            self.workers.spawn(worker.run(ctx.clone()));
        }
        // workers now hold the only outcome senders
        drop(sink);

        self.inbound_tx = Some(inbound_tx);
        self.persisted_rx = Some(persisted_rx);
        self.failed_rx = Some(failed_rx);

        info!(
            workers = self.config.worker_count,
            inbound_capacity = self.config.inbound_capacity,
            handlers = self.handlers.len(),
            "event persistence processor initialized"
        );
        Ok(())
    }

    /// Start reading input and publishing outcomes
    ///
    /// A failed start releases the worker pool before returning, since the
    /// lifecycle does not allow terminate from the initialized state.
    async fn execute_start(&mut self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let (reader, inbound_tx) = match (self.reader.take(), self.inbound_tx.take()) {
            (Some(reader), Some(inbound_tx)) => (reader, inbound_tx),
            _ => {
                error!(component = %self.name, "no reader available, releasing worker pool");
                self.release().await;
                return Err(ProcessorError::ReaderUnavailable.into());
            }
        };

        if let Some(failed_rx) = self.failed_rx.take() {
            self.publishers
                .spawn(run_failed_publisher(failed_rx, self.failed_writer.clone()));
        }
        if let Some(persisted_rx) = self.persisted_rx.take() {
            self.publishers.spawn(run_persisted_publisher(
                persisted_rx,
                self.persisted_writer.clone(),
            ));
        }

        self.read_token = ctx.child_token();
        let read_token = self.read_token.clone();
        let done = self.reader_done.clone().drop_guard();
        self.reader_task.spawn(async move {
            let _done = done;
            run_read_loop(reader, inbound_tx, read_token).await;
        });

        info!(component = %self.name, "event persistence processor started");
        Ok(())
    }

    /// Stop reading and drain every queue in pipeline order
    async fn execute_stop(&mut self, _ctx: &CancellationToken) -> anyhow::Result<()> {
        info!(component = %self.name, "stopping event persistence processor");
        self.read_token.cancel();

        let timeout = self.config.shutdown_timeout;
        if tokio::time::timeout(timeout, self.drain()).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "event persistence pipeline did not drain in time, aborting tasks"
            );
            self.abort_all();
            self.drain().await;
        }

        info!(component = %self.name, "event persistence processor stopped");
        Ok(())
    }

    /// Release anything still held
    async fn execute_terminate(&mut self, _ctx: &CancellationToken) -> anyhow::Result<()> {
        self.release().await;

        info!(component = %self.name, "event persistence processor terminated");
        Ok(())
    }
}
