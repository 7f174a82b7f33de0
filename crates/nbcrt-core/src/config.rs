// ── Runtime sync configuration ──
//
// Describes *what* a sync run produces: default templates, ordered override
// rules and filters. Built by the CLI from the config file and handed in;
// core never reads config files.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

/// Default connection protocol written into new sessions.
pub const DEFAULT_PROTOCOL: &str = "SSH2";
/// Default folder template below the session root.
pub const DEFAULT_PATH_TEMPLATE: &str = "{tenant_name}/{region_name}/{site_name}/{device_role}";
pub const DEFAULT_DEVICE_NAME_TEMPLATE: &str = "{device_name}";
pub const DEFAULT_FIREWALL: &str = "None";

/// Descriptor field an override rule writes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverrideTarget {
    Path,
    DeviceName,
    Description,
    ConnectionProtocol,
    Credential,
    Firewall,
}

/// One conditional override: when `condition` is true, `value` replaces
/// the target field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub target: OverrideTarget,
    pub condition: String,
    pub value: String,
}

/// Templates resolved for every session before overrides run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTemplates {
    pub path: String,
    pub device_name: String,
    pub connection_protocol: String,
    pub credential: String,
    pub firewall: String,
}

impl Default for SessionTemplates {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH_TEMPLATE.into(),
            device_name: DEFAULT_DEVICE_NAME_TEMPLATE.into(),
            connection_protocol: DEFAULT_PROTOCOL.into(),
            credential: String::new(),
            firewall: DEFAULT_FIREWALL.into(),
        }
    }
}

/// Everything the engine needs to turn inventory into sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub templates: SessionTemplates,
    /// Applied in order; later matches win.
    pub overrides: Vec<OverrideRule>,
    /// Every filter must hold for an entity to get a session.
    pub filters: Vec<String>,
    /// Also create sessions that reach devices through console servers.
    pub console_sessions: bool,
    /// Include virtual machines.
    pub virtual_machines: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            templates: SessionTemplates::default(),
            overrides: Vec::new(),
            filters: Vec::new(),
            console_sessions: false,
            virtual_machines: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse_from_config_names() {
        assert_eq!(
            "connection_protocol".parse::<OverrideTarget>().ok(),
            Some(OverrideTarget::ConnectionProtocol)
        );
        assert_eq!(OverrideTarget::DeviceName.to_string(), "device_name");
        assert!("hostname".parse::<OverrideTarget>().is_err());
        assert_eq!(OverrideTarget::VARIANTS.len(), 6);
    }
}
