//! Playout-server control protocol
//!
//! Command encoding, the per-component TCP client, and parsers for the two
//! structured responses the engine reads (media listing and layer status).

pub mod client;
pub mod command;
pub mod listing;
pub mod status;

pub use client::{AmcpClient, Terminator};
pub use command::{ChromaKey, Clip, Command, Fill, KeyColor, Layer};
pub use listing::{parse_listing_line, parse_movies, status_code, ListingEntry};
pub use status::{foreground_file, normalize_clip_path, playback_time, ForegroundFile, TimeSample};
