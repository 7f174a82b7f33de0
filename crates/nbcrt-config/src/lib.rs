//! Configuration for the nbcrt CLI.
//!
//! YAML or TOML config file + `NBCRT_` environment overrides, token
//! resolution (env + keyring + plaintext), SecureCRT directory discovery,
//! and translation to `nbcrt_core::SyncConfig` and
//! `nbcrt_api::TransportConfig`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use nbcrt_api::{TlsMode, TransportConfig};
use nbcrt_core::config::{
    DEFAULT_DEVICE_NAME_TEMPLATE, DEFAULT_FIREWALL, DEFAULT_PATH_TEMPLATE, DEFAULT_PROTOCOL,
};
use nbcrt_core::{OverrideRule, OverrideTarget, SessionTemplates, SyncConfig};

/// Config file looked up in the home directory before the platform dir.
pub const LEGACY_CONFIG_FILE: &str = ".securecrt-inventory.yaml";
pub const ENV_PREFIX: &str = "NBCRT_";
const KEYRING_SERVICE: &str = "nbcrt";
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no NetBox token configured for {url}")]
    NoCredentials { url: String },

    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("failed to read SecureCRT default session {}: {source}", path.display())]
    DefaultSession {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(String),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config structs ──────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,

    /// NetBox base URL; a bare host gets `https://`.
    pub netbox_url: String,

    /// API token (plaintext, prefer keyring or env var).
    pub netbox_token: Option<String>,

    /// Environment variable name containing the API token.
    pub netbox_token_env: Option<String>,

    /// Accept self-signed NetBox certificates.
    pub netbox_insecure: bool,

    /// Path to a custom CA certificate.
    pub netbox_ca_cert: Option<PathBuf>,

    /// HTTP timeout in seconds.
    pub netbox_timeout: u64,

    /// Folder below `Sessions/` owned by nbcrt.
    pub root_path: String,

    /// SecureCRT configuration folder, when not in the default location.
    pub securecrt_config_path: Option<PathBuf>,

    pub filters: Vec<FilterConfig>,

    pub session: SessionConfig,

    #[serde(rename = "console_server_sync_enable")]
    pub console_sessions: bool,

    #[serde(rename = "virtual_machine_sync_enable")]
    pub virtual_machines: bool,

    #[serde(rename = "periodic_sync_enable")]
    pub periodic_sync: bool,

    /// Minutes between periodic runs.
    pub periodic_sync_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "error".into(),
            netbox_url: String::new(),
            netbox_token: None,
            netbox_token_env: None,
            netbox_insecure: false,
            netbox_ca_cert: None,
            netbox_timeout: 30,
            root_path: "NetBox".into(),
            securecrt_config_path: None,
            filters: Vec::new(),
            session: SessionConfig::default(),
            console_sessions: false,
            virtual_machines: true,
            periodic_sync: false,
            periodic_sync_interval: 60,
        }
    }
}

/// A filter condition. `target` is accepted for compatibility and unused.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub condition: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub path: String,
    pub device_name: String,
    pub session_options: SessionOptions,
    pub overrides: Vec<OverrideConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH_TEMPLATE.into(),
            device_name: DEFAULT_DEVICE_NAME_TEMPLATE.into(),
            session_options: SessionOptions::default(),
            overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionOptions {
    pub connection_protocol: String,
    pub credential: String,
    pub firewall: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connection_protocol: DEFAULT_PROTOCOL.into(),
            credential: String::new(),
            firewall: DEFAULT_FIREWALL.into(),
        }
    }
}

/// Override rule as written in the file; `target` is checked by `validate`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OverrideConfig {
    pub target: String,
    pub condition: String,
    pub value: String,
}

// ── Config file path ────────────────────────────────────────────────

/// `~/.securecrt-inventory.yaml` when present, otherwise `config.yaml` in
/// the platform config directory.
pub fn config_path() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        let legacy = base.home_dir().join(LEGACY_CONFIG_FILE);
        if legacy.is_file() {
            return legacy;
        }
    }
    project_dirs().map_or_else(
        || PathBuf::from(LEGACY_CONFIG_FILE),
        |dirs| dirs.config_dir().join("config.yaml"),
    )
}

/// Directory for nbcrt's own files (logs).
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().to_path_buf())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "nbcrt", "nbcrt")
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (format by extension) and the environment.
///
/// A missing file yields the defaults plus any `NBCRT_` variables.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new().merge(Serialized::defaults(Config::default()));
    let figment = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => figment.merge(Toml::file(path)),
        _ => figment.merge(Yaml::file(path)),
    };
    let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Serialization formats for `render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

/// Render `config` with the plaintext token masked.
pub fn render(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    let shown = config.masked();
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&shown).map_err(|e| ConfigError::Serialization(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(&shown).map_err(|e| ConfigError::Serialization(e.to_string()))
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// A copy safe to display: the plaintext token is replaced.
    pub fn masked(&self) -> Self {
        let mut shown = self.clone();
        if shown.netbox_token.is_some() {
            shown.netbox_token = Some("********".into());
        }
        shown
    }

    /// Check everything that can be checked without network access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.netbox_base_url()?;

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(invalid(
                "log_level",
                format!("expected one of {}, got '{}'", LOG_LEVELS.join(", "), self.log_level),
            ));
        }

        if self.periodic_sync_interval == 0 {
            return Err(invalid("periodic_sync_interval", "must be at least one minute"));
        }

        validate_root_path(&self.root_path)?;

        for (index, filter) in self.filters.iter().enumerate() {
            if filter.condition.trim().is_empty() {
                return Err(invalid(format!("filters[{index}].condition"), "can not be empty"));
            }
        }

        self.override_rules().map(|_| ())
    }

    /// The NetBox base URL, normalized.
    pub fn netbox_base_url(&self) -> Result<url::Url, ConfigError> {
        if self.netbox_url.trim().is_empty() {
            return Err(invalid("netbox_url", "not set"));
        }
        nbcrt_api::normalize_base_url(&self.netbox_url)
            .map_err(|e| invalid("netbox_url", e.to_string()))
    }

    fn override_rules(&self) -> Result<Vec<OverrideRule>, ConfigError> {
        self.session
            .overrides
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let field = |name: &str| format!("session.overrides[{index}].{name}");
                if rule.target.trim().is_empty() {
                    return Err(invalid(field("target"), "can not be empty"));
                }
                if rule.condition.trim().is_empty() {
                    return Err(invalid(field("condition"), "can not be empty"));
                }
                let target: OverrideTarget = rule.target.trim().parse().map_err(|_| {
                    invalid(
                        field("target"),
                        format!(
                            "expected one of {}, got '{}'",
                            <OverrideTarget as strum::VariantNames>::VARIANTS.join(", "),
                            rule.target
                        ),
                    )
                })?;
                Ok(OverrideRule {
                    target,
                    condition: rule.condition.clone(),
                    value: rule.value.clone(),
                })
            })
            .collect()
    }

    // ── Translation ─────────────────────────────────────────────────

    /// Engine configuration. Empty templates fall back to the defaults.
    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let or_default = |value: &str, default: &str| {
            if value.trim().is_empty() {
                default.to_owned()
            } else {
                value.to_owned()
            }
        };
        let options = &self.session.session_options;

        Ok(SyncConfig {
            templates: SessionTemplates {
                path: or_default(&self.session.path, DEFAULT_PATH_TEMPLATE),
                device_name: or_default(&self.session.device_name, DEFAULT_DEVICE_NAME_TEMPLATE),
                connection_protocol: or_default(&options.connection_protocol, DEFAULT_PROTOCOL),
                credential: options.credential.clone(),
                firewall: or_default(&options.firewall, DEFAULT_FIREWALL),
            },
            overrides: self.override_rules()?,
            filters: self.filters.iter().map(|f| f.condition.clone()).collect(),
            console_sessions: self.console_sessions,
            virtual_machines: self.virtual_machines,
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = if self.netbox_insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.netbox_ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.netbox_timeout),
        }
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_sync_interval.saturating_mul(60))
    }

    // ── SecureCRT locations ─────────────────────────────────────────

    /// SecureCRT's configuration folder.
    pub fn securecrt_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.securecrt_config_path {
            return Ok(path.clone());
        }
        let base = BaseDirs::new().ok_or(ConfigError::NoConfigDir)?;
        let relative = if cfg!(windows) {
            "VanDyke/Config"
        } else {
            "VanDyke/SecureCRT/Config"
        };
        Ok(base.config_dir().join(relative))
    }

    /// Folder nbcrt writes sessions into.
    pub fn session_root(&self) -> Result<PathBuf, ConfigError> {
        validate_root_path(&self.root_path)?;
        Ok(self.securecrt_dir()?.join("Sessions").join(&self.root_path))
    }

    /// SecureCRT's `Default.ini`, written at the top of every session.
    pub fn session_header(&self) -> Result<String, ConfigError> {
        let path = self.securecrt_dir()?.join("Sessions").join("Default.ini");
        std::fs::read_to_string(&path).map_err(|source| ConfigError::DefaultSession { path, source })
    }
}

fn validate_root_path(root: &str) -> Result<(), ConfigError> {
    let path = Path::new(root);
    if root.trim().is_empty() {
        return Err(invalid("root_path", "can not be empty"));
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid(
            "root_path",
            format!("'{root}' must be a relative folder below Sessions/"),
        ));
    }
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the NetBox token: `netbox_token_env`, then the keyring entry for
/// the NetBox host, then the plaintext value.
pub fn resolve_token(config: &Config) -> Result<SecretString, ConfigError> {
    resolve_token_with(
        config,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_token_with(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Environment variable named in the config
    if let Some(token) = config.netbox_token_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(token));
    }

    // 2. System keyring, keyed by host
    let url = config.netbox_base_url()?;
    let account = url.host_str().unwrap_or(url.as_str()).to_owned();
    if let Some(token) = keyring(&account) {
        return Ok(SecretString::from(token));
    }

    // 3. Plaintext in config
    if let Some(ref token) = config.netbox_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        url: url.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn with_url() -> Config {
        Config {
            netbox_url: "netbox.example.com".into(),
            ..Config::default()
        }
    }

    const YAML: &str = r#"
log_level: INFO
netbox_url: https://netbox.example.com
netbox_token: secret
root_path: Inventory
console_server_sync_enable: true
filters:
  - target: device
    condition: '{{ device_role != "Patch Panel" }}'
session:
  path: "{tenant_name}/{site_name}"
  session_options:
    credential: netops
  overrides:
    - target: firewall
      condition: '{{ site_group == "dmz" }}'
      value: edge-fw
"#;

    #[test]
    fn loads_yaml_with_defaults_filled() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&write(dir.path(), "config.yaml", YAML)).unwrap();
        config.validate().unwrap();

        assert_eq!(config.root_path, "Inventory");
        assert!(config.console_sessions);
        assert!(config.virtual_machines);
        assert_eq!(config.periodic_sync_interval, 60);
        assert_eq!(config.session.device_name, DEFAULT_DEVICE_NAME_TEMPLATE);
        assert_eq!(config.session.session_options.connection_protocol, DEFAULT_PROTOCOL);

        let sync = config.sync_config().unwrap();
        assert_eq!(sync.templates.path, "{tenant_name}/{site_name}");
        assert_eq!(sync.templates.credential, "netops");
        assert_eq!(sync.templates.firewall, DEFAULT_FIREWALL);
        assert_eq!(sync.overrides[0].target, OverrideTarget::Firewall);
        assert_eq!(sync.filters, vec![r#"{{ device_role != "Patch Panel" }}"#.to_owned()]);
    }

    #[test]
    fn loads_toml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "config.toml",
            "netbox_url = \"netbox.lab\"\nperiodic_sync_enable = true\nperiodic_sync_interval = 15\n",
        );
        let config = load_config(&path).unwrap();

        assert!(config.periodic_sync);
        assert_eq!(config.periodic_interval(), Duration::from_secs(900));
        assert_eq!(config.netbox_base_url().unwrap().as_str(), "https://netbox.lab/");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.root_path, "NetBox");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "netbox_url"
        ));
    }

    #[test]
    fn empty_templates_fall_back_to_defaults() {
        let mut config = with_url();
        config.session.path = String::new();
        config.session.session_options.firewall = " ".into();

        let sync = config.sync_config().unwrap();
        assert_eq!(sync.templates.path, DEFAULT_PATH_TEMPLATE);
        assert_eq!(sync.templates.firewall, DEFAULT_FIREWALL);
    }

    #[test]
    fn rejects_incomplete_or_unknown_overrides() {
        let rule = |target: &str, condition: &str| OverrideConfig {
            target: target.into(),
            condition: condition.into(),
            value: "x".into(),
        };
        let cases = [
            (rule("", "true"), "session.overrides[0].target"),
            (rule("path", ""), "session.overrides[0].condition"),
            (rule("hostname", "true"), "session.overrides[0].target"),
        ];

        for (override_rule, expected) in cases {
            let mut config = with_url();
            config.session.overrides = vec![override_rule];
            match config.validate() {
                Err(ConfigError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_escaping_root_path() {
        for root in ["../Other", "/abs", ""] {
            let config = Config {
                root_path: root.into(),
                ..with_url()
            };
            assert!(config.validate().is_err(), "{root} accepted");
        }
    }

    #[test]
    fn securecrt_locations_follow_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Sessions")).unwrap();
        write(&dir.path().join("Sessions"), "Default.ini", "S:\"Username\"=\n");

        let config = Config {
            securecrt_config_path: Some(dir.path().to_path_buf()),
            ..with_url()
        };
        assert_eq!(config.session_root().unwrap(), dir.path().join("Sessions/NetBox"));
        assert_eq!(config.session_header().unwrap(), "S:\"Username\"=\n");
    }

    #[test]
    fn missing_default_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            securecrt_config_path: Some(dir.path().to_path_buf()),
            ..with_url()
        };
        assert!(matches!(
            config.session_header(),
            Err(ConfigError::DefaultSession { .. })
        ));
    }

    #[test]
    fn token_resolution_order() {
        let config = Config {
            netbox_token: Some("plain".into()),
            netbox_token_env: Some("NETBOX_TOKEN".into()),
            ..with_url()
        };
        let from_env = |_: &str| Some("env".to_owned());
        let no_env = |_: &str| None;
        let keyring = |account: &str| (account == "netbox.example.com").then(|| "keyring".to_owned());

        let token = resolve_token_with(&config, from_env, keyring).unwrap();
        assert_eq!(token.expose_secret(), "env");

        let token = resolve_token_with(&config, no_env, keyring).unwrap();
        assert_eq!(token.expose_secret(), "keyring");

        let token = resolve_token_with(&config, no_env, |_| None).unwrap();
        assert_eq!(token.expose_secret(), "plain");

        let bare = with_url();
        assert!(matches!(
            resolve_token_with(&bare, no_env, |_| None),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn render_masks_token() {
        let config = Config {
            netbox_token: Some("super-secret".into()),
            ..with_url()
        };
        for format in [ConfigFormat::Yaml, ConfigFormat::Toml] {
            let rendered = render(&config, format).unwrap();
            assert!(!rendered.contains("super-secret"));
            assert!(rendered.contains("********"));
        }
    }
}
