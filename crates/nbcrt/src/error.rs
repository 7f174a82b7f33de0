//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use nbcrt_config::ConfigError;
use nbcrt_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const INVENTORY: i32 = 4;
    pub const FILESYSTEM: i32 = 5;
    pub const TEMPLATE: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── NetBox ───────────────────────────────────────────────────────

    #[error("Could not set up the NetBox client for {url}")]
    #[diagnostic(
        code(nbcrt::client_setup),
        help(
            "Check netbox_url, the token, and netbox_ca_cert if set.\n\
             Self-signed certificate? Use --insecure (-k)."
        )
    )]
    ClientSetup {
        url: String,
        #[source]
        source: nbcrt_api::Error,
    },

    #[error("Failed to fetch {resource} from NetBox: {reason}")]
    #[diagnostic(
        code(nbcrt::fetch_failed),
        help("No session files were changed. Run: nbcrt config validate")
    )]
    FetchFailed {
        resource: String,
        reason: String,
        transient: bool,
    },

    #[error("No NetBox token configured for {url}")]
    #[diagnostic(
        code(nbcrt::no_credentials),
        help(
            "Set netbox_token_env to the name of an environment variable holding the token,\n\
             store it in the system keyring (service 'nbcrt', account '<netbox host>'),\n\
             or pass --token."
        )
    )]
    NoCredentials { url: String },

    // ── Inventory ────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(nbcrt::inventory),
        help(
            "Fix the record in NetBox or exclude it with a filter.\n\
             No session files were changed."
        )
    )]
    Inventory { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(nbcrt::template),
        help("Check the session templates and overrides in your config file.")
    )]
    Template { message: String },

    // ── Session files ────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(nbcrt::filesystem),
        help("Session files may be partially updated; the next successful run converges them.")
    )]
    Filesystem { message: String },

    #[error("SecureCRT configuration not found: {message}")]
    #[diagnostic(
        code(nbcrt::securecrt_not_found),
        help("Set securecrt_config_path to your SecureCRT configuration folder.")
    )]
    SecureCrtNotFound { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nbcrt::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(nbcrt::no_config),
        help(
            "Create a YAML config with at least netbox_url.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(nbcrt::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ClientSetup { .. } => exit_code::CONNECTION,
            Self::FetchFailed { transient, .. } => {
                if *transient {
                    exit_code::CONNECTION
                } else {
                    exit_code::GENERAL
                }
            }
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Inventory { .. } => exit_code::INVENTORY,
            Self::Template { .. } => exit_code::TEMPLATE,
            Self::Filesystem { .. } | Self::SecureCrtNotFound { .. } => exit_code::FILESYSTEM,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Fetch {
                resource,
                reason,
                transient,
            } => CliError::FetchFailed {
                resource,
                reason,
                transient,
            },

            CoreError::SiteNotFound { .. }
            | CoreError::MissingSite { .. }
            | CoreError::MissingPrimaryIp { .. }
            | CoreError::ConsoleServerNotFound { .. } => CliError::Inventory { message },

            CoreError::Evaluation { .. } | CoreError::InvalidPath { .. } => {
                CliError::Template { message }
            }

            CoreError::Codec { .. }
            | CoreError::Write { .. }
            | CoreError::Delete { .. }
            | CoreError::Scan { .. } => CliError::Filesystem { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { url } => CliError::NoCredentials { url },
            ConfigError::NoConfigDir | ConfigError::DefaultSession { .. } => {
                CliError::SecureCrtNotFound {
                    message: err.to_string(),
                }
            }
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Serialization(message) => CliError::Render(message),
        }
    }
}
