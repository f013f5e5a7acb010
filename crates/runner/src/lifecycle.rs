//! Four-stage component lifecycle.
//!
//! ```text
//! Uninitialized --initialize--> Initialized --start--> Started --stop--> Stopped --terminate--> Terminated
//! ```
//!
//! Every transition runs the `before` hook, the component's stage action and
//! the `after` hook, in that order. Out-of-order calls fail with
//! [`LifecycleError::InvalidTransition`] without touching the component.
//! A component whose start fails must release what it acquired before
//! returning the error, since terminate is only reachable after stop.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Initialize,
    Start,
    Stop,
    Terminate,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStage::Initialize => "initialize",
            LifecycleStage::Start => "start",
            LifecycleStage::Stop => "stop",
            LifecycleStage::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

impl LifecycleState {
    /// State reached by running `stage` from this state
    pub fn transition(self, stage: LifecycleStage) -> Result<LifecycleState, LifecycleError> {
        use LifecycleStage::*;
        use LifecycleState::*;

        match (self, stage) {
            (Uninitialized, Initialize) => Ok(Initialized),
            (Initialized, Start) => Ok(Started),
            (Started, Stop) => Ok(Stopped),
            (Stopped, Terminate) => Ok(Terminated),
            (state, stage) => Err(LifecycleError::InvalidTransition { state, stage }),
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("cannot {stage} component in state {state}")]
    InvalidTransition {
        state: LifecycleState,
        stage: LifecycleStage,
    },

    #[error("{component} {stage} hook failed: {source:#}")]
    Hook {
        component: String,
        stage: LifecycleStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{component} failed to {stage}: {source:#}")]
    Stage {
        component: String,
        stage: LifecycleStage,
        #[source]
        source: anyhow::Error,
    },
}

/// Component driven through the lifecycle stages
#[async_trait]
pub trait LifecycleComponent: Send {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn execute_initialize(&mut self, ctx: &CancellationToken) -> anyhow::Result<()>;

    async fn execute_start(&mut self, ctx: &CancellationToken) -> anyhow::Result<()>;

    async fn execute_stop(&mut self, ctx: &CancellationToken) -> anyhow::Result<()>;

    async fn execute_terminate(&mut self, ctx: &CancellationToken) -> anyhow::Result<()>;
}

/// Callbacks run around every stage; both default to doing nothing
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before(&self, _component: &str, _stage: LifecycleStage) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after(&self, _component: &str, _stage: LifecycleStage) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct NoOpLifecycleHooks;

#[async_trait]
impl LifecycleHooks for NoOpLifecycleHooks {}

/// Owns a component and enforces its lifecycle state transitions
pub struct LifecycleManager<C: LifecycleComponent> {
    component: C,
    state: LifecycleState,
    hooks: Arc<dyn LifecycleHooks>,
}

impl<C: LifecycleComponent> LifecycleManager<C> {
    pub fn new(component: C) -> Self {
        Self::with_hooks(component, Arc::new(NoOpLifecycleHooks))
    }

    pub fn with_hooks(component: C, hooks: Arc<dyn LifecycleHooks>) -> Self {
        Self {
            component,
            state: LifecycleState::Uninitialized,
            hooks,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub async fn initialize(&mut self, ctx: &CancellationToken) -> Result<(), LifecycleError> {
        self.transition(ctx, LifecycleStage::Initialize).await
    }

    pub async fn start(&mut self, ctx: &CancellationToken) -> Result<(), LifecycleError> {
        self.transition(ctx, LifecycleStage::Start).await
    }

    pub async fn stop(&mut self, ctx: &CancellationToken) -> Result<(), LifecycleError> {
        self.transition(ctx, LifecycleStage::Stop).await
    }

    /// Terminating an already terminated component is a no-op
    pub async fn terminate(&mut self, ctx: &CancellationToken) -> Result<(), LifecycleError> {
        if self.state == LifecycleState::Terminated {
            debug!(component = %self.component.name(), "component already terminated");
            return Ok(());
        }
        self.transition(ctx, LifecycleStage::Terminate).await
    }

    async fn transition(
        &mut self,
        ctx: &CancellationToken,
        stage: LifecycleStage,
    ) -> Result<(), LifecycleError> {
        let next = self.state.transition(stage)?;
        let name = self.component.name().to_string();

        self.hooks
            .before(&name, stage)
            .await
            .map_err(|source| LifecycleError::Hook {
                component: name.clone(),
                stage,
                source,
            })?;

        let result = match stage {
            LifecycleStage::Initialize => self.component.execute_initialize(ctx).await,
            LifecycleStage::Start => self.component.execute_start(ctx).await,
            LifecycleStage::Stop => self.component.execute_stop(ctx).await,
            LifecycleStage::Terminate => self.component.execute_terminate(ctx).await,
        };
        result.map_err(|source| LifecycleError::Stage {
            component: name.clone(),
            stage,
            source,
        })?;

        // the stage action has taken effect even if the after hook fails
        self.state = next;
        info!(component = %name, state = %next, "lifecycle transition complete");

        self.hooks
            .after(&name, stage)
            .await
            .map_err(|source| LifecycleError::Hook {
                component: name,
                stage,
                source,
            })
    }
}
