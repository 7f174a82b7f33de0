// NetBox REST response shapes.
//
// Only the fields the session engine consumes are modelled explicitly.
// Free-form data (custom fields, config context) is kept as raw JSON so
// expressions can still reach it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Paginated list envelope: `{ count, next, previous, results }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A brief nested object (region, site group, tenant, role, platform, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// Brief device reference. NetBox allows unnamed devices, so `name` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedDevice {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display: String,
}

impl NestedDevice {
    /// Best human-readable label: the name, falling back to display.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.display)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: i64,
    /// CIDR notation, e.g. `10.0.0.1/24`.
    pub address: String,
    #[serde(default)]
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: i64,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<NestedRef>,
}

/// `GET /api/dcim/sites/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub physical_address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub region: Option<NestedRef>,
    #[serde(default)]
    pub group: Option<NestedRef>,
    #[serde(default)]
    pub tenant: Option<NestedRef>,
}

/// `GET /api/dcim/devices/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub device_type: DeviceType,
    /// NetBox 3.x calls this `device_role`.
    #[serde(alias = "device_role", default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub tenant: Option<NestedRef>,
    #[serde(default)]
    pub platform: Option<NestedRef>,
    pub site: NestedRef,
    #[serde(default)]
    pub primary_ip: Option<IpAddress>,
    #[serde(default)]
    pub virtual_chassis: Option<NestedRef>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
    #[serde(default)]
    pub config_context: Value,
}

/// `GET /api/virtualization/virtual-machines/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub cluster: Option<NestedRef>,
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub tenant: Option<NestedRef>,
    #[serde(default)]
    pub platform: Option<NestedRef>,
    #[serde(default)]
    pub primary_ip: Option<IpAddress>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
    #[serde(default)]
    pub config_context: Value,
}

/// Far end of a console server port cable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedEndpoint {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub device: NestedDevice,
}

/// `GET /api/dcim/console-server-ports/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleServerPort {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display: String,
    pub device: NestedDevice,
    #[serde(default)]
    pub connected_endpoints: Option<Vec<ConnectedEndpoint>>,
}

impl ConsoleServerPort {
    /// The device cabled to this port, if any.
    pub fn connected_device(&self) -> Option<&NestedDevice> {
        self.connected_endpoints
            .as_deref()
            .and_then(<[ConnectedEndpoint]>::first)
            .map(|endpoint| &endpoint.device)
    }
}
