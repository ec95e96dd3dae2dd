//! Catalog refresher
//!
//! Mirrors the server's media listing into the catalog on a fixed interval.

use rma_common::events::{AutomationEvent, EventBus};
use rma_common::time;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{sleep_or_cancel, WorkerContext};
use crate::amcp::{parse_movies, status_code, AmcpClient, Command};
use crate::catalog::{CatalogStore, ReconcileReport};
use crate::error::{Error, Result};

pub async fn run(ctx: WorkerContext) -> Result<()> {
    let client = ctx.client();
    let mut tick = tokio::time::interval(ctx.config.refresh_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            _ = tick.tick() => {}
        }

        match refresh_with_retry(&ctx, &client).await {
            Ok(_) => {}
            Err(Error::Shutdown) => break,
            Err(e) => error!("Catalog refresh failed, next attempt in {:?}: {}", ctx.config.refresh_interval(), e),
        }
    }

    client.disconnect().await;
    info!("Refresher stopping");
    Ok(())
}

/// One pass plus a bounded number of retries after storage errors
///
/// Non-storage errors are not retried; the next interval tries again.
pub async fn refresh_with_retry(ctx: &WorkerContext, client: &AmcpClient) -> Result<Option<ReconcileReport>> {
    let retries = ctx.config.refresher.storage_retries;
    let delay = std::time::Duration::from_secs(ctx.config.refresher.retry_delay_secs);

    let mut attempt = 0;
    loop {
        match refresh_once(client, &ctx.store, ctx.state.events(), &ctx.shutdown).await {
            Ok(report) => return Ok(report),
            Err(e) if e.is_storage() && attempt < retries => {
                attempt += 1;
                warn!("Storage error during refresh ({}), retry {}/{} in {:?}", e, attempt, retries, delay);
                if !sleep_or_cancel(&ctx.shutdown, delay).await {
                    return Err(Error::Shutdown);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// List the server's media and reconcile the catalog against it
///
/// Returns `Ok(None)` without touching the catalog when the server did not
/// answer with a successful listing.
pub async fn refresh_once(
    client: &AmcpClient,
    store: &CatalogStore,
    events: &EventBus,
    shutdown: &CancellationToken,
) -> Result<Option<ReconcileReport>> {
    let response = client.request_simple(&Command::ListMedia).await?;

    // A listing cut short by shutdown would delete everything it is missing
    if shutdown.is_cancelled() {
        return Err(Error::Shutdown);
    }

    match status_code(&response) {
        Some(200) => {}
        code => {
            warn!("Media listing not successful (status {:?}), catalog left unchanged", code);
            return Ok(None);
        }
    }

    let movies = parse_movies(&response);
    debug!("Listing contains {} movies", movies.len());

    let report = store.reconcile(&movies, time::now()).await?;
    info!(
        "Catalog refreshed: {} added, {} removed, {} total",
        report.added.len(),
        report.removed.len(),
        report.total
    );

    events.emit_lossy(AutomationEvent::CatalogRefreshed {
        added: report.added.len(),
        removed: report.removed.len(),
        total: report.total,
        timestamp: time::now(),
    });

    Ok(Some(report))
}
