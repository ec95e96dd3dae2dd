//! Database models

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Media type reported by the playout server listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Still,
    Movie,
}

impl MediaKind {
    /// Wire/database spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Still => "STILL",
            MediaKind::Movie => "MOVIE",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STILL" => Ok(MediaKind::Still),
            "MOVIE" => Ok(MediaKind::Movie),
            other => Err(Error::InvalidInput(format!("Unknown media kind: {}", other))),
        }
    }
}

/// Rational frame rate, e.g. 25/1 or 30000/1001
///
/// Only constructible with a non-zero numerator and denominator, so
/// [`FrameRate::duration_secs`] never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            None
        } else {
            Some(Self { num, den })
        }
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn fps(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Clip length for `frames` frames at this rate
    pub fn duration_secs(&self, frames: u64) -> f64 {
        frames as f64 * f64::from(self.den) / f64::from(self.num)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("Frame rate without '/': {}", s)))?;
        let num = num
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::InvalidInput(format!("Invalid frame rate numerator: {}", e)))?;
        let den = den
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::InvalidInput(format!("Invalid frame rate denominator: {}", e)))?;
        FrameRate::new(num, den)
            .ok_or_else(|| Error::InvalidInput(format!("Zero-valued frame rate: {}", s)))
    }
}

/// One known media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    /// Server-relative, forward-slash path (unique)
    pub path: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub modified_at: NaiveDateTime,
    pub frame_count: u64,
    pub frame_rate: FrameRate,
    pub last_seen_at: DateTime<Utc>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub description: Option<String>,
    pub blocked: bool,
}

impl CatalogEntry {
    /// Always derived from frame count and rate
    pub fn duration_secs(&self) -> f64 {
        self.frame_rate.duration_secs(self.frame_count)
    }
}

/// One play start, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayLogEntry {
    pub id: i64,
    pub media_id: i64,
    pub started_at: DateTime<Utc>,
}
