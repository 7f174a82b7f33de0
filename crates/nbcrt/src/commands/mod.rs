//! Command dispatch: bridges CLI args -> config + engine -> output formatting.

pub mod config_cmd;
pub mod progress;
pub mod sessions;
pub mod sync;
pub mod watch;

use std::path::PathBuf;

use secrecy::SecretString;

use nbcrt_api::NetBoxClient;
use nbcrt_config::Config;
use nbcrt_core::{SessionStore, SyncEngine};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The loaded configuration and where it came from.
pub struct Context {
    pub path: PathBuf,
    pub config: Config,
}

impl Context {
    /// Apply global flag overrides on top of the loaded config.
    pub fn new(path: PathBuf, mut config: Config, global: &GlobalOpts) -> Self {
        if let Some(ref url) = global.netbox_url {
            config.netbox_url.clone_from(url);
        }
        if global.insecure {
            config.netbox_insecure = true;
        }
        Self { path, config }
    }

    /// Fail with a pointer to the expected file when nothing is configured.
    fn require_config(&self) -> Result<(), CliError> {
        if self.config.netbox_url.trim().is_empty() && !self.path.is_file() {
            return Err(CliError::NoConfig {
                path: self.path.display().to_string(),
            });
        }
        Ok(())
    }

    /// The session store below the configured root.
    pub fn store(&self) -> Result<SessionStore, CliError> {
        let root = self.config.session_root()?;
        Ok(SessionStore::new(root, ""))
    }

    /// Build the sync engine: validated config, token, client and store.
    pub fn engine(&self, global: &GlobalOpts) -> Result<SyncEngine<NetBoxClient>, CliError> {
        self.require_config()?;
        self.config.validate()?;
        let sync_config = self.config.sync_config()?;

        let token = match global.token {
            Some(ref token) => SecretString::from(token.clone()),
            None => nbcrt_config::resolve_token(&self.config)?,
        };
        let url = self.config.netbox_base_url()?;
        let client = NetBoxClient::new(url.as_str(), &token, &self.config.transport_config())
            .map_err(|source| CliError::ClientSetup {
                url: url.to_string(),
                source,
            })?;

        let store = SessionStore::new(self.config.session_root()?, self.config.session_header()?);
        tracing::debug!(root = %store.root().display(), netbox = %url, "engine ready");
        Ok(SyncEngine::new(client, sync_config, store))
    }
}

/// Dispatch a config-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Sync(args) => sync::handle(args, ctx, global).await,
        Command::Watch(args) => watch::handle(args, ctx, global).await,
        Command::Sessions(args) => sessions::handle(args, ctx, global).await,
        Command::Config(args) => config_cmd::handle(args, ctx, global),
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
