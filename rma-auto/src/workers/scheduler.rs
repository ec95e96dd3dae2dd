//! Scheduler (playback manager)
//!
//! Idle until the play-next signal fires, then selects a clip, plays it,
//! records the play and updates the on-air overlay. Every
//! `stinger_interval` plays the stinger sequence runs.
//!
//! A failed cycle (nothing eligible, storage error, play command rejected)
//! re-arms the signal after `empty_retry_secs`, since nothing new is on air
//! for the monitor to finish.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rma_common::events::AutomationEvent;
use rma_common::time;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::selection::{select_clip, Selection};
use super::{issue, sleep_or_cancel, WorkerContext};
use crate::amcp::{AmcpClient, ChromaKey, Clip, Command, KeyColor};
use crate::catalog::display_metadata;
use crate::error::{Error, Result};

/// Chroma key applied to the stinger layer
const STINGER_KEY: ChromaKey = ChromaKey {
    color: KeyColor::Green,
    threshold: 0.1,
    softness: 0.2,
    spill: 1.0,
};

/// Pause between fading the logo and starting the stinger
const STINGER_LEAD_IN: Duration = Duration::from_secs(1);

/// Overlay template data
#[derive(Debug, Serialize)]
struct OverlayData<'a> {
    artist: &'a str,
    song: &'a str,
}

/// `CG ADD` data argument: the JSON object, encoded again as a JSON string
pub fn overlay_payload(artist: &str, title: &str) -> Result<String> {
    let inner = serde_json::to_string(&OverlayData { artist, song: title })
        .map_err(|e| Error::Internal(format!("Overlay encoding failed: {}", e)))?;
    serde_json::to_string(&inner).map_err(|e| Error::Internal(format!("Overlay encoding failed: {}", e)))
}

pub async fn run(ctx: WorkerContext) -> Result<()> {
    let client = ctx.client();
    let mut rng = StdRng::from_entropy();
    let mut plays_since_stinger: u32 = 0;
    let retry_delay = Duration::from_secs(ctx.config.scheduler.empty_retry_secs);

    match setup_logo(&client, &ctx).await {
        Ok(()) => {}
        Err(Error::Shutdown) => return Ok(()),
        Err(e) => warn!("Logo setup failed: {}", e),
    }

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            _ = ctx.state.wait_play_next() => {}
        }
        if ctx.shutdown.is_cancelled() {
            break;
        }

        match play_next(&client, &ctx, &mut rng).await {
            Ok(_) => {
                plays_since_stinger += 1;
                if plays_since_stinger >= ctx.config.playback.stinger_interval {
                    plays_since_stinger = 0;
                    match run_stinger(&client, &ctx).await {
                        Ok(()) => {}
                        Err(Error::Shutdown) => break,
                        Err(e) => warn!("Stinger sequence failed: {}", e),
                    }
                }
            }
            Err(Error::Shutdown) => break,
            Err(e) => {
                match &e {
                    Error::NoEligibleClip(_) => warn!("{}, retrying in {:?}", e, retry_delay),
                    _ => error!("Play cycle failed, retrying in {:?}: {}", retry_delay, e),
                }
                if !sleep_or_cancel(&ctx.shutdown, retry_delay).await {
                    break;
                }
                ctx.state.request_play_next();
            }
        }
    }

    client.disconnect().await;
    info!("Scheduler stopping");
    Ok(())
}

/// Select and start one clip
///
/// An `Err` means nothing new went on air: no clip, or the play command was
/// not acknowledged with a 2xx status. Once it is, later failures (play log,
/// overlay) are logged and the cycle succeeds.
pub async fn play_next<R: Rng + ?Sized>(
    client: &AmcpClient,
    ctx: &WorkerContext,
    rng: &mut R,
) -> Result<Selection> {
    let playback = &ctx.config.playback;
    let selection = select_clip(
        &ctx.store,
        &ctx.config.scheduler,
        &playback.music_prefix,
        time::now(),
        rng,
    )
    .await?;

    if selection.degraded {
        ctx.state.events().emit_lossy(AutomationEvent::SelectionDegraded {
            timestamp: time::now(),
        });
    }

    let clip = &selection.candidate;
    let play = Command::play_mix(ctx.content_layer(), clip.path.clone(), playback.mix_duration);
    issue(client, &ctx.shutdown, &play).await?;

    let started = time::now();
    if let Err(e) = ctx.store.record_play(clip.media_id, started).await {
        error!("Failed to record play of {}: {}", clip.path, e);
    }

    let (artist, title) = match ctx.store.display_metadata(clip.media_id).await {
        Ok(Some(meta)) => meta,
        Ok(None) => display_metadata(&clip.path, clip.artist.as_deref(), clip.title.as_deref()),
        Err(e) => {
            warn!("Metadata lookup for {} failed: {}", clip.path, e);
            display_metadata(&clip.path, clip.artist.as_deref(), clip.title.as_deref())
        }
    };

    match update_overlay(client, ctx, &artist, &title).await {
        Ok(()) => {}
        Err(Error::Shutdown) => return Err(Error::Shutdown),
        Err(e) => warn!("Overlay update failed: {}", e),
    }

    info!("Now playing: {} - {}", artist, title);
    ctx.state.events().emit_lossy(AutomationEvent::ClipStarted {
        media_id: clip.media_id,
        path: clip.path.clone(),
        artist,
        title,
        forced_artist: selection.forced_artist,
        timestamp: started,
    });

    Ok(selection)
}

async fn update_overlay(client: &AmcpClient, ctx: &WorkerContext, artist: &str, title: &str) -> Result<()> {
    let data = overlay_payload(artist, title)?;
    debug!("Overlay data: {}", data);
    let command = Command::CgAdd {
        channel: ctx.config.amcp.channel,
        cg_layer: 1,
        template: ctx.config.playback.now_play_name.clone(),
        play_on_load: true,
        data,
    };
    issue(client, &ctx.shutdown, &command).await
}

/// Idle visual: logo fill and looped logo
pub async fn setup_logo(client: &AmcpClient, ctx: &WorkerContext) -> Result<()> {
    restore_logo(client, ctx, None).await
}

async fn restore_logo(client: &AmcpClient, ctx: &WorkerContext, mix: Option<u32>) -> Result<()> {
    let layer = ctx.logo_layer();
    let fill = Command::MixerFill {
        layer,
        fill: ctx.config.playback.logo_fill.into(),
    };
    issue(client, &ctx.shutdown, &fill).await?;
    issue(client, &ctx.shutdown, &Command::play_loop(layer, ctx.config.playback.logo_path.clone(), mix)).await
}

/// Fade the logo, key and play the stinger, hold, then restore the logo
pub async fn run_stinger(client: &AmcpClient, ctx: &WorkerContext) -> Result<()> {
    let playback = &ctx.config.playback;
    info!("Triggering stinger sequence");

    issue(client, &ctx.shutdown, &Command::fade_out(ctx.logo_layer(), playback.mix_duration)).await?;
    if !sleep_or_cancel(&ctx.shutdown, STINGER_LEAD_IN).await {
        return Err(Error::Shutdown);
    }

    let chroma = Command::MixerChroma {
        layer: ctx.stinger_layer(),
        key: STINGER_KEY,
    };
    issue(client, &ctx.shutdown, &chroma).await?;
    let stinger = Command::Play {
        layer: ctx.stinger_layer(),
        clip: Clip::Media(playback.stinger_path.clone()),
        mix: None,
        looping: false,
        auto: true,
    };
    issue(client, &ctx.shutdown, &stinger).await?;

    if !sleep_or_cancel(&ctx.shutdown, Duration::from_secs(playback.stinger_hold_secs)).await {
        return Err(Error::Shutdown);
    }

    restore_logo(client, ctx, Some(playback.mix_duration)).await?;
    ctx.state.events().emit_lossy(AutomationEvent::StingerPlayed {
        timestamp: time::now(),
    });
    Ok(())
}
