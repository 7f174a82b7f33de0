// ── Session descriptor ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default SSH port written into every session.
pub const DEFAULT_PORT: u16 = 22;

/// Firewall (jump session) reference stored in `Firewall Name`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Firewall {
    /// Direct connection, rendered as the `None` sentinel.
    #[default]
    Disabled,
    /// Reference as SecureCRT expects it, e.g. `Session:edge-fw`.
    Reference(String),
}

impl Firewall {
    const SENTINEL: &'static str = "None";

    /// Interpret a stored or template-resolved value verbatim.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | Self::SENTINEL => Self::Disabled,
            other => Self::Reference(other.to_owned()),
        }
    }

    /// Interpret an override value: a bare session name gains the `Session:`
    /// prefix.
    pub fn from_session_name(value: &str) -> Self {
        match value.trim() {
            "" | Self::SENTINEL => Self::Disabled,
            other => Self::Reference(format!("Session:{other}")),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Disabled => Self::SENTINEL,
            Self::Reference(reference) => reference,
        }
    }
}

impl fmt::Display for Firewall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Firewall> for String {
    fn from(firewall: Firewall) -> Self {
        firewall.as_str().to_owned()
    }
}

impl From<String> for Firewall {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// The fully resolved attributes of one SecureCRT session.
///
/// Reconciliation identity is `device_name` alone: two descriptors with the
/// same name in different folders are the same session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub device_name: String,
    /// Folder below the session root, `/`-separated, no leading slash.
    pub path: String,
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    pub description: String,
    pub credential: Option<String>,
    pub firewall: Firewall,
}

impl SessionDescriptor {
    /// An empty descriptor for `device_name` at `path`, used as the decode
    /// target when reading files back.
    pub fn named(device_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            path: path.into(),
            ip: String::new(),
            port: DEFAULT_PORT,
            protocol: String::new(),
            description: String::new(),
            credential: None,
            firewall: Firewall::Disabled,
        }
    }

    /// Path of the session file relative to the session root.
    pub fn relative_file(&self) -> String {
        if self.path.is_empty() {
            format!("{}.ini", self.device_name)
        } else {
            format!("{}/{}.ini", self.path, self.device_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_value_gains_session_prefix() {
        assert_eq!(Firewall::from_session_name(""), Firewall::Disabled);
        assert_eq!(Firewall::from_session_name("None"), Firewall::Disabled);
        assert_eq!(
            Firewall::from_session_name("edge-fw"),
            Firewall::Reference("Session:edge-fw".into())
        );
    }

    #[test]
    fn stored_value_is_taken_verbatim() {
        assert_eq!(Firewall::parse("None"), Firewall::Disabled);
        assert_eq!(
            Firewall::parse("Session:edge-fw").as_str(),
            "Session:edge-fw"
        );
        assert_eq!(Firewall::Disabled.to_string(), "None");
    }

    #[test]
    fn relative_file_joins_path_and_name() {
        let mut session = SessionDescriptor::named("sw-01", "Acme/EU/CPH");
        assert_eq!(session.relative_file(), "Acme/EU/CPH/sw-01.ini");
        session.path.clear();
        assert_eq!(session.relative_file(), "sw-01.ini");
    }
}
