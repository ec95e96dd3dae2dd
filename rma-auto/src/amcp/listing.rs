//! Media listing (`CLS`) parsing
//!
//! Line grammar:
//!
//! ```text
//! "<path>" <STILL|MOVIE> <size> <YYYYMMDDHHMMSS> <frames> <num>/<den>
//! ```

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use rma_common::db::{FrameRate, MediaKind};

use crate::error::{Error, Result};

/// One parsed listing line
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    /// Forward-slash normalized, server-relative
    pub path: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub modified_at: NaiveDateTime,
    pub frame_count: u64,
    pub frame_rate: FrameRate,
}

impl ListingEntry {
    pub fn duration_secs(&self) -> f64 {
        self.frame_rate.duration_secs(self.frame_count)
    }

    pub fn is_movie(&self) -> bool {
        self.kind == MediaKind::Movie
    }
}

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^"(?P<path>[^"]+)"\s+(?P<kind>STILL|MOVIE)\s+(?P<size>\d+)\s+(?P<ts>\d{14})\s+(?P<frames>\d+)\s+(?P<num>\d+)/(?P<den>\d+)$"#,
        )
        .expect("listing line pattern is valid")
    })
}

/// Parse one listing line
pub fn parse_listing_line(line: &str) -> Result<ListingEntry> {
    let line = line.trim();
    let caps = line_regex()
        .captures(line)
        .ok_or_else(|| Error::Parse(format!("Listing line does not match grammar: {}", line)))?;

    let number = |name: &str| -> Result<u64> {
        caps[name]
            .parse::<u64>()
            .map_err(|e| Error::Parse(format!("Invalid {} in '{}': {}", name, line, e)))
    };

    let kind = match &caps["kind"] {
        "MOVIE" => MediaKind::Movie,
        _ => MediaKind::Still,
    };

    let num = u32::try_from(number("num")?)
        .map_err(|_| Error::Parse(format!("Frame rate numerator out of range: {}", line)))?;
    let den = u32::try_from(number("den")?)
        .map_err(|_| Error::Parse(format!("Frame rate denominator out of range: {}", line)))?;
    let frame_rate = FrameRate::new(num, den)
        .ok_or_else(|| Error::Parse(format!("Zero-valued frame rate: {}", line)))?;

    let modified_at = NaiveDateTime::parse_from_str(&caps["ts"], "%Y%m%d%H%M%S")
        .map_err(|e| Error::Parse(format!("Invalid timestamp in '{}': {}", line, e)))?;

    Ok(ListingEntry {
        path: caps["path"].replace('\\', "/"),
        kind,
        size_bytes: number("size")?,
        modified_at,
        frame_count: number("frames")?,
        frame_rate,
    })
}

/// Parse a whole `CLS` response, keeping only movies
///
/// The status header line and any malformed or non-movie lines are skipped.
pub fn parse_movies(response: &str) -> Vec<ListingEntry> {
    response
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            tracing::debug!("CLS raw line: {}", line);
            match parse_listing_line(line) {
                Ok(entry) if entry.is_movie() => Some(entry),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("Skipping listing line: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Numeric status code of a response's first line, e.g. `200 CLS OK`
pub fn status_code(response: &str) -> Option<u16> {
    response
        .lines()
        .next()?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
