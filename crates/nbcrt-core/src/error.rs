// ── Core error types ──
//
// Every variant names the device, site or file it concerns so a failed run
// can be traced to the offending record. NetBox transport failures arrive as
// `nbcrt_api::Error` and are folded into `Fetch`.

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::eval::EvalError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Inventory errors ─────────────────────────────────────────────
    #[error("Failed to fetch {resource} from NetBox: {reason}")]
    Fetch {
        resource: String,
        reason: String,
        /// Whether the next scheduled run might succeed without changes.
        transient: bool,
    },

    #[error("Site {site_id} referenced by {entity} was not found")]
    SiteNotFound { entity: String, site_id: i64 },

    #[error("Virtual machine {entity} is not assigned to a site")]
    MissingSite { entity: String },

    #[error("{entity} has no primary IP address")]
    MissingPrimaryIp { entity: String },

    #[error("Console server {device} owning port '{port}' was not found")]
    ConsoleServerNotFound { device: String, port: String },

    // ── Resolution errors ────────────────────────────────────────────
    #[error("Failed to resolve {field} for {device}: {source}")]
    Evaluation {
        device: String,
        field: String,
        #[source]
        source: EvalError,
    },

    #[error("Session path '{path}' for {device} is not allowed: {reason}")]
    InvalidPath {
        device: String,
        path: String,
        reason: String,
    },

    // ── Store errors ─────────────────────────────────────────────────
    #[error("Malformed session file {}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Failed to write session file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan session directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Wrap a NetBox client failure for the named collection.
    pub fn fetch(resource: &str, err: &nbcrt_api::Error) -> Self {
        Self::Fetch {
            resource: resource.to_owned(),
            reason: err.to_string(),
            transient: err.is_transient(),
        }
    }

    /// The device this error is attributed to, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::SiteNotFound { entity, .. }
            | Self::MissingSite { entity }
            | Self::MissingPrimaryIp { entity } => Some(entity),
            Self::Evaluation { device, .. }
            | Self::InvalidPath { device, .. }
            | Self::ConsoleServerNotFound { device, .. } => Some(device),
            _ => None,
        }
    }
}
