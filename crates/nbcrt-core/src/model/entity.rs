// ── Inventory entity ──

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Which NetBox collection an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Device,
    VirtualMachine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
}

/// A device or virtual machine as seen by the session engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub kind: EntityKind,
    /// Raw NetBox name. Unnamed devices fall back to the display string.
    pub name: String,
    pub display: String,
    pub site_id: Option<i64>,
    /// Primary address in CIDR notation, e.g. `10.0.0.1/24`.
    pub primary_ip: Option<String>,
    pub role: Option<String>,
    /// Device type display for devices, platform display for VMs.
    pub device_type: Option<String>,
    pub tenant: Option<String>,
    pub virtual_chassis: Option<String>,
    pub tags: Vec<Tag>,
    /// The full NetBox document, reachable from expressions as `device`.
    #[serde(skip)]
    pub raw: Value,
}

impl Entity {
    /// Primary address with the prefix length removed.
    pub fn primary_address(&self) -> Option<&str> {
        self.primary_ip
            .as_deref()
            .and_then(|cidr| cidr.split('/').next())
            .filter(|addr| !addr.is_empty())
    }
}
