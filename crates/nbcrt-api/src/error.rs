use thiserror::Error;

/// Top-level error type for the `nbcrt-api` crate.
///
/// Covers every failure mode of a NetBox fetch: transport, authentication,
/// non-success HTTP responses and malformed JSON. `nbcrt-core` folds all of
/// these into a single fetch failure that aborts the sync run.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected by NetBox (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Token could not be turned into a header value.
    #[error("Invalid API token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from a NetBox endpoint.
    #[error("NetBox API error (HTTP {status}) on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error on {endpoint}: {message}")]
    Deserialization {
        endpoint: String,
        message: String,
        body: String,
    },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying
    /// on the next scheduled run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The endpoint the failing request targeted, if known.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Api { endpoint, .. } | Self::Deserialization { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}
