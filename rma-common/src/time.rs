//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to a chrono duration for timestamp arithmetic
pub fn secs_to_chrono(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    chrono::Duration::seconds(secs)
}

/// Timestamp `secs` seconds before `at`
pub fn cutoff(at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    at.checked_sub_signed(secs_to_chrono(secs))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
