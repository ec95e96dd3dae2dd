//! # Rock Music Automation (rma-auto)
//!
//! Playout automation for a line-protocol video server: keeps a local
//! catalog in sync with the server's media, watches playback progress,
//! schedules the next clip under anti-repeat and artist-cooldown rules,
//! inserts periodic stingers, and restarts any worker that dies.

pub mod amcp;
pub mod catalog;
pub mod control;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod workers;

pub use control::ControlHandle;
pub use error::{Error, Result};
pub use state::SharedState;
