//! Error types shared across the crate.

use thiserror::Error;

/// Convenience alias used by every fallible operation in this crate.
pub type ZeppResult<T> = std::result::Result<T, ZeppError>;

#[derive(Debug, Error)]
pub enum ZeppError {
    /// No installable distribution artifact is currently obtainable.
    /// Surfaced as a blocked status, never retried automatically.
    #[error("no usable distribution artifact is available")]
    UnavailableResource,

    /// Fetch, extraction or copy failure while installing the distribution.
    #[error("installation failed: {0}")]
    Install(String),

    /// A bounded readiness or shutdown wait expired. Fatal; the operator
    /// must intervene.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A named daemon-side entity (e.g. an interpreter setting) is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status or malformed body from the daemon.
    #[error("unexpected response from daemon (status {status}): {detail}")]
    BadResponse { status: u16, detail: String },

    /// A lifecycle operation was attempted out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Filesystem or persistent-state failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration file could not be read, parsed or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// Init-system action failed (non-zero exit from the service manager).
    #[error("service manager error: {0}")]
    Service(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}
