//! Clip selection policy
//!
//! The anti-repeat window is a hard filter, relaxed only when it leaves
//! nothing to play. The artist cooldown is soft: candidates by a recently
//! played artist are redrawn, up to a fixed budget, after which any draw is
//! accepted.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rma_common::config::SchedulerConfig;
use rma_common::time::cutoff;
use tracing::{debug, warn};

use crate::catalog::{Candidate, CatalogStore};
use crate::error::{Error, Result};

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub candidate: Candidate,
    /// Draw budget ran out; the artist cooldown was ignored
    pub forced_artist: bool,
    /// Every clip was inside the anti-repeat window; repeats were allowed
    pub degraded: bool,
}

/// Draw uniformly, preferring artists not in `recent_artists`
///
/// `recent_artists` holds lowercased names. Returns the pick and whether
/// the cooldown had to be ignored, or `None` if there are no candidates.
pub fn draw_candidate<R: Rng + ?Sized>(
    candidates: &[Candidate],
    recent_artists: &HashSet<String>,
    budget: usize,
    rng: &mut R,
) -> Option<(Candidate, bool)> {
    for _ in 0..budget {
        let pick = candidates.choose(rng)?;
        if !recent_artists.contains(&pick.artist_key()) {
            return Some((pick.clone(), false));
        }
        debug!("Redrawing, artist of {} played recently", pick.path);
    }

    candidates.choose(rng).map(|pick| (pick.clone(), true))
}

/// Pick the next clip under `prefix`
pub async fn select_clip<R: Rng + ?Sized>(
    store: &CatalogStore,
    policy: &SchedulerConfig,
    prefix: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Selection> {
    let mut candidates = store
        .eligible_clips(prefix, cutoff(now, policy.anti_repeat_secs))
        .await?;

    let degraded = candidates.is_empty();
    if degraded {
        warn!("No clip outside the anti-repeat window, allowing repeats");
        candidates = store.unblocked_clips(prefix).await?;
    }

    if candidates.is_empty() {
        return Err(Error::NoEligibleClip(prefix.to_string()));
    }

    let recent = store
        .recent_artists(cutoff(now, policy.artist_cooldown_secs))
        .await?;

    let (candidate, forced_artist) = draw_candidate(&candidates, &recent, policy.draw_budget, rng)
        .ok_or_else(|| Error::NoEligibleClip(prefix.to_string()))?;

    if forced_artist {
        warn!(
            "All {} draws hit a recently played artist, accepting {}",
            policy.draw_budget, candidate.path
        );
    }
    debug!(
        "Selected {} from {} candidates ({} recent artists)",
        candidate.path,
        candidates.len(),
        recent.len()
    );

    Ok(Selection {
        candidate,
        forced_artist,
        degraded,
    })
}
