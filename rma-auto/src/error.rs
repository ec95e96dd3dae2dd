//! Error types for rma-auto
//!
//! Transport failures are healed inside the protocol client and only reach
//! callers when shutdown interrupts a retry loop. Parse failures are per-line
//! or per-poll and never fatal. Storage failures get a bounded retry in the
//! refresher. Anything that escapes a worker loop ends that worker, and the
//! supervisor restarts it.

use thiserror::Error;

/// Main error type for rma-auto
#[derive(Error, Debug)]
pub enum Error {
    /// Connect/send/receive failure that survived the client's retry
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed listing line or status payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// No clip passed the selection filters, even with repeats allowed
    #[error("No eligible clip under '{0}'")]
    NoEligibleClip(String),

    /// Server answered a playout command with a non-2xx status
    #[error("Command '{command}' rejected: {reply}")]
    Rejected { command: String, reply: String },

    /// Process-wide shutdown interrupted the operation
    #[error("Shutdown requested")]
    Shutdown,

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from rma-common
    #[error(transparent)]
    Common(#[from] rma_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class, for callers that react differently per class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Parse,
    Logic,
    Storage,
    Shutdown,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport(_) | Error::Io(_) => ErrorCategory::Transport,
            Error::Parse(_) => ErrorCategory::Parse,
            Error::Database(_) | Error::Common(rma_common::Error::Database(_)) => {
                ErrorCategory::Storage
            }
            Error::Shutdown => ErrorCategory::Shutdown,
            Error::NoEligibleClip(_)
            | Error::Rejected { .. }
            | Error::Config(_)
            | Error::Common(_)
            | Error::Internal(_) => ErrorCategory::Logic,
        }
    }

    /// Storage failures are the only ones the refresher retries
    pub fn is_storage(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }
}

/// Convenience Result type using rma-auto Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(Error::Transport("reset".into()).category(), ErrorCategory::Transport);
        assert_eq!(Error::Parse("bad xml".into()).category(), ErrorCategory::Parse);
        assert_eq!(Error::NoEligibleClip("ROCK MUSIC/".into()).category(), ErrorCategory::Logic);
        let rejected = Error::Rejected {
            command: "PLAY 1-10 \"GONE\"".into(),
            reply: "404 PLAY FAILED".into(),
        };
        assert_eq!(rejected.category(), ErrorCategory::Logic);
        assert_eq!(Error::Shutdown.category(), ErrorCategory::Shutdown);
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_storage());
        assert!(Error::Common(rma_common::Error::Database(sqlx::Error::PoolClosed)).is_storage());
        assert!(!Error::Common(rma_common::Error::Config("x".into())).is_storage());
    }
}
