//! Supervisor (watchdog)
//!
//! Polls worker liveness on a fixed interval and replaces any worker whose
//! task has ended while the process is still running. Restarts are
//! unconditional and unthrottled: a worker that crashes on every start is
//! restarted once per interval, indefinitely.

use std::collections::BTreeMap;

use rma_common::events::AutomationEvent;
use rma_common::time;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::{sleep_or_cancel, spawn_worker, WorkerContext, WorkerHandle, WorkerKind};

pub struct Supervisor {
    ctx: WorkerContext,
    workers: Mutex<BTreeMap<WorkerKind, WorkerHandle>>,
    restarts: Mutex<BTreeMap<WorkerKind, u64>>,
}

impl Supervisor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            workers: Mutex::new(BTreeMap::new()),
            restarts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Spawn every worker type not already running
    pub async fn start_all(&self) {
        let mut workers = self.workers.lock().await;
        for kind in WorkerKind::ALL {
            if !workers.contains_key(&kind) {
                workers.insert(kind, spawn_worker(kind, &self.ctx));
            }
        }
    }

    /// One liveness pass; returns the workers that were restarted
    pub async fn check_workers(&self) -> Vec<WorkerKind> {
        if self.ctx.shutdown.is_cancelled() {
            return Vec::new();
        }

        let mut restarted = Vec::new();
        let mut workers = self.workers.lock().await;
        for (kind, handle) in workers.iter_mut() {
            if handle.is_alive() {
                continue;
            }

            error!("Worker {} stopped! Restarting...", kind);
            *handle = spawn_worker(*kind, &self.ctx);
            restarted.push(*kind);
        }
        drop(workers);

        if !restarted.is_empty() {
            let mut restarts = self.restarts.lock().await;
            for kind in &restarted {
                *restarts.entry(*kind).or_insert(0) += 1;
                self.ctx.state.events().emit_lossy(AutomationEvent::WorkerRestarted {
                    worker: kind.to_string(),
                    timestamp: time::now(),
                });
            }
        }

        restarted
    }

    /// Stop a worker cleanly and start a fresh instance
    pub async fn restart(&self, kind: WorkerKind) {
        let mut workers = self.workers.lock().await;
        if let Some(old) = workers.remove(&kind) {
            old.stop().await;
        }
        if self.ctx.shutdown.is_cancelled() {
            return;
        }
        info!("Starting fresh {} worker", kind);
        workers.insert(kind, spawn_worker(kind, &self.ctx));
    }

    pub async fn is_alive(&self, kind: WorkerKind) -> bool {
        self.workers
            .lock()
            .await
            .get(&kind)
            .map(|handle| handle.is_alive())
            .unwrap_or(false)
    }

    /// Crash restarts performed for `kind`
    pub async fn restart_count(&self, kind: WorkerKind) -> u64 {
        self.restarts.lock().await.get(&kind).copied().unwrap_or(0)
    }

    /// Abort a worker's task as if it had crashed
    pub async fn kill(&self, kind: WorkerKind) -> bool {
        match self.workers.lock().await.get(&kind) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Watchdog loop; returns after shutdown once every worker has exited
    pub async fn run(&self) {
        info!(
            "Supervisor watching {} workers every {:?}",
            WorkerKind::ALL.len(),
            self.ctx.config.supervisor_interval()
        );
        loop {
            if !sleep_or_cancel(&self.ctx.shutdown, self.ctx.config.supervisor_interval()).await {
                break;
            }
            self.check_workers().await;
        }
        self.shutdown().await;
    }

    /// Stop and await every worker
    pub async fn shutdown(&self) {
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for (_, handle) in workers {
            handle.stop().await;
        }
        info!("All workers stopped");
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor").finish_non_exhaustive()
    }
}
