//! Progress monitor
//!
//! Polls the content layer's status once per interval and raises the
//! play-next signal on each clip-completion edge.

use std::time::{Duration, Instant};

use rma_common::events::AutomationEvent;
use rma_common::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{sleep_or_cancel, WorkerContext};
use crate::amcp::{playback_time, AmcpClient, Command, Layer, TimeSample};
use crate::error::{Error, Result};
use crate::state::{PlaybackProgress, SharedState};

pub async fn run(ctx: WorkerContext) -> Result<()> {
    let client = ctx.client();
    let layer = ctx.content_layer();
    let poll_interval = ctx.config.poll_interval();
    let backoff = Duration::from_millis(ctx.config.monitor.error_backoff_ms);
    let mut reporter = ProgressReporter::default();

    loop {
        if ctx.shutdown.is_cancelled() {
            break;
        }

        let pause = match poll_once(&client, layer, &ctx.state, &ctx.shutdown).await {
            Ok((edge, progress)) => {
                if edge {
                    info!(
                        "Clip finished at {:.1}s / {:.1}s, requesting next clip",
                        progress.current, progress.total
                    );
                    ctx.state.events().emit_lossy(AutomationEvent::ClipFinished {
                        position: progress.current,
                        duration: progress.total,
                        timestamp: time::now(),
                    });
                    ctx.state.request_play_next();
                }
                if progress.is_playing && reporter.should_report(progress.percent(), Instant::now()) {
                    debug!(
                        "Progress: {:.1}s / {:.1}s ({:.1}% complete)",
                        progress.current,
                        progress.total,
                        progress.percent()
                    );
                }
                poll_interval
            }
            Err(Error::Shutdown) => break,
            Err(e) => {
                warn!("Progress poll failed: {}", e);
                backoff
            }
        };

        if !sleep_or_cancel(&ctx.shutdown, pause).await {
            break;
        }
    }

    client.disconnect().await;
    info!("Monitor stopping");
    Ok(())
}

/// Query the layer once and fold the result into shared state
pub async fn poll_once(
    client: &AmcpClient,
    layer: Layer,
    state: &SharedState,
    shutdown: &CancellationToken,
) -> Result<(bool, PlaybackProgress)> {
    let response = client.request_structured(&Command::Info(layer)).await?;
    // Partial document from an interrupted read
    if shutdown.is_cancelled() {
        return Err(Error::Shutdown);
    }
    let sample = playback_time(&response, layer.layer)?;
    Ok(state.update_progress(sample).await)
}

/// Current `(position, length)` of the layer's foreground file
pub async fn query_playback(client: &AmcpClient, layer: Layer) -> Result<Option<TimeSample>> {
    let response = client.request_structured(&Command::Info(layer)).await?;
    playback_time(&response, layer.layer)
}

/// Whether a clip is already part-way through
///
/// Used once at startup: if something is mid-play, the first play-next
/// comes from the monitor at clip end instead of immediately.
pub async fn probe_initial_playback(client: &AmcpClient, layer: Layer) -> Result<bool> {
    match query_playback(client, layer).await? {
        Some(sample) => {
            let percent = sample.progress_percent();
            info!(
                "Startup probe: {:.1}s / {:.1}s ({:.1}%) on layer {}",
                sample.current, sample.total, percent, layer
            );
            Ok(percent > 0.0 && percent < 99.0)
        }
        None => Ok(false),
    }
}

/// Throttle for the progress log line
///
/// Reports at most once per second, or whenever a new 10% band is entered.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    last_report: Option<Instant>,
    last_band: Option<u8>,
}

impl ProgressReporter {
    pub fn should_report(&mut self, percent: f64, now: Instant) -> bool {
        let band = (percent.clamp(0.0, 100.0) / 10.0).floor() as u8;
        let due = match self.last_report {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(1),
        };
        let crossed = self.last_band != Some(band);

        if due || crossed {
            self.last_report = Some(now);
            self.last_band = Some(band);
            true
        } else {
            false
        }
    }
}
