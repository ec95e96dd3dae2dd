//! Background workers
//!
//! Every worker is one tokio task running a loop until its cancellation token
//! fires. Each task gets a child of the process-wide shutdown token, so the
//! supervisor can stop one worker without touching the others, and process
//! shutdown reaches all of them. Each worker opens its own protocol client.

pub mod monitor;
pub mod refresher;
pub mod scheduler;
pub mod selection;
pub mod supervisor;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rma_common::AutomationConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::amcp::{status_code, AmcpClient, Command, Layer};
use crate::catalog::CatalogStore;
use crate::error::{Error, Result};
use crate::state::SharedState;

/// The restartable worker types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkerKind {
    Refresher,
    Monitor,
    Scheduler,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 3] = [WorkerKind::Monitor, WorkerKind::Refresher, WorkerKind::Scheduler];

    pub fn name(&self) -> &'static str {
        match self {
            WorkerKind::Refresher => "refresher",
            WorkerKind::Monitor => "monitor",
            WorkerKind::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dependencies shared by every worker instance
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub config: Arc<AutomationConfig>,
    pub store: CatalogStore,
    pub state: Arc<SharedState>,
    pub shutdown: CancellationToken,
}

impl WorkerContext {
    pub fn new(
        config: Arc<AutomationConfig>,
        store: CatalogStore,
        state: Arc<SharedState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            state,
            shutdown,
        }
    }

    /// Same dependencies, different cancellation scope
    pub fn with_shutdown(&self, shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            ..self.clone()
        }
    }

    /// Fresh protocol client bound to this context's token
    pub fn client(&self) -> AmcpClient {
        AmcpClient::from_config(&self.config, self.shutdown.clone())
    }

    pub fn content_layer(&self) -> Layer {
        Layer::new(self.config.amcp.channel, self.config.playback.content_layer)
    }

    pub fn stinger_layer(&self) -> Layer {
        Layer::new(self.config.amcp.channel, self.config.playback.stinger_layer)
    }

    pub fn logo_layer(&self) -> Layer {
        Layer::new(self.config.amcp.channel, self.config.playback.logo_layer)
    }
}

/// A running worker task
#[derive(Debug)]
pub struct WorkerHandle {
    kind: WorkerKind,
    join: JoinHandle<Result<()>>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Abort the task without a clean exit, as if it crashed
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Cancel the worker and wait for it to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        match self.join.await {
            Ok(Ok(())) => info!("Worker {} stopped", self.kind),
            Ok(Err(e)) => error!("Worker {} exited with error: {}", self.kind, e),
            Err(e) if e.is_cancelled() => info!("Worker {} aborted", self.kind),
            Err(e) => error!("Worker {} panicked: {}", self.kind, e),
        }
    }
}

/// Start a worker of `kind` on its own task
pub fn spawn_worker(kind: WorkerKind, ctx: &WorkerContext) -> WorkerHandle {
    let cancel = ctx.shutdown.child_token();
    let worker_ctx = ctx.with_shutdown(cancel.clone());

    let join = tokio::spawn(async move {
        info!("Worker {} started", kind);
        let result = match kind {
            WorkerKind::Refresher => refresher::run(worker_ctx).await,
            WorkerKind::Monitor => monitor::run(worker_ctx).await,
            WorkerKind::Scheduler => scheduler::run(worker_ctx).await,
        };
        if let Err(e) = &result {
            error!("Worker {} failed: {}", kind, e);
        }
        result
    });

    WorkerHandle { kind, join, cancel }
}

/// Sleep for `duration` unless cancelled first
///
/// Returns `false` if the token fired.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Send `command` and require a 2xx status reply
///
/// Waiting for the reply keeps it from being read as the reply to the
/// next command on the same connection.
pub async fn issue(client: &AmcpClient, shutdown: &CancellationToken, command: &Command) -> Result<()> {
    let reply = client.request_line(command).await?;
    if shutdown.is_cancelled() {
        return Err(Error::Shutdown);
    }
    match status_code(&reply) {
        Some(200..=299) => Ok(()),
        _ => Err(Error::Rejected {
            command: command.to_string(),
            reply,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_or_cancel() {
        let token = CancellationToken::new();
        assert!(sleep_or_cancel(&token, Duration::from_millis(5)).await);

        token.cancel();
        let started = std::time::Instant::now();
        assert!(!sleep_or_cancel(&token, Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_worker_names() {
        let names: Vec<_> = WorkerKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["monitor", "refresher", "scheduler"]);
    }
}
