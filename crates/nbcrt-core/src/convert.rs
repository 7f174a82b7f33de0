// ── API-to-domain type conversions ──
//
// Bridges raw `nbcrt_api` response types into `nbcrt_core::model` types.
// Nested references collapse to their display strings; the original
// document is kept as raw JSON for expression lookups.

use serde::Serialize;
use serde_json::Value;

use nbcrt_api::models as api;

use crate::model::{ConsolePort, Entity, EntityKind, Site, Tag};

// ── Helpers ────────────────────────────────────────────────────────

fn raw_document<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Display string of a nested reference, falling back to its name.
fn label(reference: Option<&api::NestedRef>) -> Option<String> {
    reference.map(|r| {
        if r.display.is_empty() {
            r.name.clone()
        } else {
            r.display.clone()
        }
    })
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn convert_tags(tags: &[api::Tag]) -> Vec<Tag> {
    tags.iter()
        .map(|t| Tag {
            name: t.name.clone(),
            slug: t.slug.clone(),
        })
        .collect()
}

// ── Conversions ────────────────────────────────────────────────────

impl From<api::Site> for Site {
    fn from(site: api::Site) -> Self {
        let raw = raw_document(&site);
        Self {
            id: site.id,
            display: if site.display.is_empty() {
                site.name.clone()
            } else {
                site.display.clone()
            },
            name: site.name,
            physical_address: site.physical_address,
            region: label(site.region.as_ref()),
            group: site
                .group
                .as_ref()
                .and_then(|g| g.slug.clone().or_else(|| non_empty(&g.name))),
            raw,
        }
    }
}

impl From<api::Device> for Entity {
    fn from(device: api::Device) -> Self {
        let raw = raw_document(&device);
        let display = if device.display.is_empty() {
            device.name.clone().unwrap_or_default()
        } else {
            device.display.clone()
        };
        Self {
            id: device.id,
            kind: EntityKind::Device,
            name: device.name.clone().unwrap_or_else(|| display.clone()),
            display,
            site_id: Some(device.site.id),
            primary_ip: device.primary_ip.as_ref().map(|ip| ip.address.clone()),
            role: label(device.role.as_ref()),
            device_type: non_empty(&device.device_type.display)
                .or_else(|| non_empty(&device.device_type.model)),
            tenant: label(device.tenant.as_ref()),
            virtual_chassis: label(device.virtual_chassis.as_ref()),
            tags: convert_tags(&device.tags),
            raw,
        }
    }
}

impl From<api::VirtualMachine> for Entity {
    fn from(vm: api::VirtualMachine) -> Self {
        let raw = raw_document(&vm);
        Self {
            id: vm.id,
            kind: EntityKind::VirtualMachine,
            display: if vm.display.is_empty() {
                vm.name.clone()
            } else {
                vm.display.clone()
            },
            name: vm.name.clone(),
            site_id: vm.site.as_ref().map(|s| s.id),
            primary_ip: vm.primary_ip.as_ref().map(|ip| ip.address.clone()),
            role: label(vm.role.as_ref()),
            device_type: label(vm.platform.as_ref()),
            tenant: label(vm.tenant.as_ref()),
            virtual_chassis: None,
            tags: convert_tags(&vm.tags),
            raw,
        }
    }
}

impl From<api::ConsoleServerPort> for ConsolePort {
    fn from(port: api::ConsoleServerPort) -> Self {
        let endpoint = port.connected_device();
        Self {
            id: port.id,
            endpoint_id: endpoint.map(|d| d.id),
            endpoint_name: endpoint.map(|d| d.label().to_owned()),
            server_id: port.device.id,
            server_name: port.device.label().to_owned(),
            name: port.name,
        }
    }
}
