//! Manual override entry points
//!
//! Whatever drives manual control (keyboard, remote panel) calls these; each
//! maps onto a signal or action the workers already understand.

use std::sync::Arc;

use rma_common::events::AutomationEvent;
use rma_common::time;
use tracing::{info, warn};

use crate::amcp::{foreground_file, normalize_clip_path, AmcpClient, Command};
use crate::error::{Error, Result};
use crate::workers::supervisor::Supervisor;
use crate::workers::scheduler::setup_logo;
use crate::workers::{issue, WorkerContext, WorkerKind};

#[derive(Debug)]
pub struct ControlHandle {
    ctx: WorkerContext,
    supervisor: Arc<Supervisor>,
    client: AmcpClient,
}

impl ControlHandle {
    pub fn new(ctx: WorkerContext, supervisor: Arc<Supervisor>) -> Self {
        let client = ctx.client();
        Self {
            ctx,
            supervisor,
            client,
        }
    }

    /// Skip to the next clip
    pub fn play_next(&self) {
        info!("Play-next requested");
        self.ctx.state.request_play_next();
    }

    /// Exclude the clip currently on air from future selection
    ///
    /// Returns the catalog path that was blocked, or `None` if nothing is on
    /// air or the on-air file is not in the catalog.
    pub async fn block_current(&self) -> Result<Option<String>> {
        let layer = self.ctx.content_layer();
        let response = self.client.request_structured(&Command::Info(layer)).await?;
        if self.ctx.shutdown.is_cancelled() {
            return Err(Error::Shutdown);
        }

        let raw = match foreground_file(&response, layer.layer)?.and_then(|file| file.path) {
            Some(raw) => raw,
            None => {
                warn!("Nothing on layer {} to block", layer);
                return Ok(None);
            }
        };

        let path = normalize_clip_path(&raw);
        if !self.ctx.store.set_blocked(&path, true).await? {
            warn!("On-air file {} has no catalog entry", path);
            return Ok(None);
        }

        info!("Blocked clip: {}", path);
        self.ctx.state.events().emit_lossy(AutomationEvent::ClipBlocked {
            path: path.clone(),
            timestamp: time::now(),
        });
        Ok(Some(path))
    }

    /// Stop the progress monitor and start a fresh one
    pub async fn restart_monitor(&self) {
        info!("Monitor restart requested");
        self.supervisor.restart(WorkerKind::Monitor).await;
    }

    /// Clear every layer of the channel
    ///
    /// Nothing re-arms the play-next signal; playback resumes on the next
    /// manual play-next.
    pub async fn clear_all(&self) -> Result<()> {
        info!("Clearing channel {}", self.ctx.config.amcp.channel);
        issue(&self.client, &self.ctx.shutdown, &Command::ClearChannel(self.ctx.config.amcp.channel)).await
    }

    pub async fn hide_logo(&self) -> Result<()> {
        info!("Hiding logo");
        issue(&self.client, &self.ctx.shutdown, &Command::Stop(self.ctx.logo_layer())).await
    }

    pub async fn show_logo(&self) -> Result<()> {
        info!("Showing logo");
        setup_logo(&self.client, &self.ctx).await
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}
