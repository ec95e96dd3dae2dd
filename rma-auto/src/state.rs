//! Shared runtime state
//!
//! Owned jointly by the progress monitor (writer) and the scheduler. Holds the
//! last polled playback position and the play-next signal.

use rma_common::events::EventBus;
use tokio::sync::{Mutex, Notify};

use crate::amcp::TimeSample;

/// Slack below the clip length still counted as playing
pub const END_TOLERANCE_SECS: f64 = 0.5;

/// Last polled playback position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackProgress {
    /// Seconds into the current clip
    pub current: f64,
    /// Clip length in seconds
    pub total: f64,
    pub is_playing: bool,
}

impl PlaybackProgress {
    /// Fold one poll result into the state
    ///
    /// Returns `true` exactly on the playing → not-playing edge. A poll that
    /// found no file forces `is_playing` off without reporting an edge.
    pub fn apply(&mut self, sample: Option<TimeSample>) -> bool {
        let was_playing = self.is_playing;
        match sample {
            Some(sample) => {
                self.current = sample.current;
                self.total = sample.total;
                self.is_playing = sample.current < sample.total - END_TOLERANCE_SECS;
                was_playing && !self.is_playing
            }
            None => {
                self.is_playing = false;
                false
            }
        }
    }

    /// Percent complete, 0 when the length is unknown
    pub fn percent(&self) -> f64 {
        TimeSample::new(self.current, self.total).progress_percent()
    }
}

/// State shared by every worker
///
/// Workers hold it behind an `Arc`.
#[derive(Debug)]
pub struct SharedState {
    progress: Mutex<PlaybackProgress>,

    /// Single-permit signal: raising it twice before it is consumed is the
    /// same as raising it once
    play_next: Notify,

    events: EventBus,
}

impl SharedState {
    pub fn new(events: EventBus) -> Self {
        Self {
            progress: Mutex::new(PlaybackProgress::default()),
            play_next: Notify::new(),
            events,
        }
    }

    /// Apply a poll result under the lock; `true` on a clip-completion edge
    ///
    /// The read-decide-write sequence runs with the lock held, so readers
    /// never observe a half-updated position.
    pub async fn update_progress(&self, sample: Option<TimeSample>) -> (bool, PlaybackProgress) {
        let mut progress = self.progress.lock().await;
        let edge = progress.apply(sample);
        (edge, *progress)
    }

    /// Snapshot of the last poll
    pub async fn progress(&self) -> PlaybackProgress {
        *self.progress.lock().await
    }

    /// Raise the play-next signal
    pub fn request_play_next(&self) {
        self.play_next.notify_one();
    }

    /// Wait for and consume the play-next signal
    pub async fn wait_play_next(&self) {
        self.play_next.notified().await;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
