// ── Per-entity attribute environment ──
//
// Flattens one device or VM plus its site into the named attributes that
// templates and expressions see. Pure: no I/O, nothing shared between
// entities.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CoreError;
use crate::eval::Scope;
use crate::model::session::DEFAULT_PORT;
use crate::model::{ConsolePort, Entity, EntityKind, Site};

pub const NO_REGION: &str = "No Region";
pub const NO_TENANT: &str = "No Tenant";
pub const VIRTUAL_MACHINE_ROLE: &str = "Virtual Machine";

/// Characters removed from names that end up in folder or file names.
const PATH_UNSAFE: &[char] = &['/', '\\', '?'];

/// How the session for an entity is reached.
#[derive(Debug, Clone, Copy)]
pub enum SyncKind<'a> {
    /// Connect to the entity's own primary IP.
    Direct,
    /// Connect through a console server port cabled to the entity.
    Console {
        port: &'a ConsolePort,
        server: &'a Entity,
    },
}

/// Sites keyed by id for the duration of one run.
#[derive(Debug, Default)]
pub struct SiteIndex<'a> {
    by_id: HashMap<i64, &'a Site>,
}

impl<'a> SiteIndex<'a> {
    pub fn new(sites: &'a [Site]) -> Self {
        Self {
            by_id: sites.iter().map(|site| (site.id, site)).collect(),
        }
    }

    pub fn get(&self, id: i64) -> Option<&'a Site> {
        self.by_id.get(&id).copied()
    }
}

/// Named attributes of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub session_type: EntityKind,
    pub device_name: String,
    pub device_role: String,
    pub device_type: String,
    pub device_ip: String,
    pub device_port: u16,
    pub region_name: String,
    pub tenant_name: String,
    pub site_name: String,
    pub site_group: String,
    pub site_address: String,
    pub virtual_chassis_name: String,
    pub is_console_session: bool,
    pub console_server_port: String,
    /// Structured documents for helper functions: `device`, `site`, `tags`
    /// and, for console sessions, `console_server`.
    pub extras: IndexMap<String, Value>,
}

impl Scope for Environment {
    fn lookup(&self, name: &str) -> Option<Value> {
        let text = |s: &str| Some(Value::String(s.to_owned()));
        match name {
            "session_type" => text(&self.session_type.to_string()),
            "device_name" => text(&self.device_name),
            "device_role" => text(&self.device_role),
            "device_type" => text(&self.device_type),
            "device_ip" => text(&self.device_ip),
            "device_port" => Some(Value::from(self.device_port)),
            "region_name" => text(&self.region_name),
            "tenant_name" => text(&self.tenant_name),
            "site_name" => text(&self.site_name),
            "site_group" => text(&self.site_group),
            "site_address" => text(&self.site_address),
            "virtual_chassis_name" => text(&self.virtual_chassis_name),
            "is_console_session" => Some(Value::Bool(self.is_console_session)),
            "console_server_port" => text(&self.console_server_port),
            other => self.extras.get(other).cloned(),
        }
    }
}

/// Remove characters that would split or break a path component.
pub fn strip_path_unsafe(name: &str) -> String {
    name.chars().filter(|c| !PATH_UNSAFE.contains(c)).collect()
}

/// Join address lines into a single line.
pub fn flatten_address(address: &str) -> String {
    address
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the environment for `entity`.
///
/// Fails when the entity's site is missing or unknown, or when the address
/// the session connects to is not set.
pub fn build_environment(
    entity: &Entity,
    sites: &SiteIndex<'_>,
    kind: SyncKind<'_>,
) -> Result<Environment, CoreError> {
    let site_id = entity.site_id.ok_or_else(|| CoreError::MissingSite {
        entity: entity.display.clone(),
    })?;
    let site = sites.get(site_id).ok_or_else(|| CoreError::SiteNotFound {
        entity: entity.display.clone(),
        site_id,
    })?;

    let (device_ip, device_name, console_server_port) = match kind {
        SyncKind::Direct => (
            entity.primary_address().ok_or_else(|| CoreError::MissingPrimaryIp {
                entity: entity.display.clone(),
            })?,
            entity.display.as_str(),
            String::new(),
        ),
        SyncKind::Console { port, server } => (
            server.primary_address().ok_or_else(|| CoreError::MissingPrimaryIp {
                entity: server.display.clone(),
            })?,
            entity.name.as_str(),
            port.name.clone(),
        ),
    };

    let (device_role, device_type) = match entity.kind {
        EntityKind::Device => (
            entity.role.clone().unwrap_or_default(),
            entity.device_type.clone().unwrap_or_default(),
        ),
        EntityKind::VirtualMachine => (
            VIRTUAL_MACHINE_ROLE.to_owned(),
            entity.device_type.clone().unwrap_or_default(),
        ),
    };

    let mut extras = IndexMap::new();
    extras.insert("device".to_owned(), entity.raw.clone());
    extras.insert("site".to_owned(), site.raw.clone());
    extras.insert(
        "tags".to_owned(),
        serde_json::to_value(&entity.tags).unwrap_or(Value::Null),
    );
    if let SyncKind::Console { server, .. } = kind {
        extras.insert("console_server".to_owned(), server.raw.clone());
    }

    Ok(Environment {
        session_type: entity.kind,
        device_name: strip_path_unsafe(device_name),
        device_role: strip_path_unsafe(&device_role),
        device_type,
        device_ip: device_ip.to_owned(),
        device_port: DEFAULT_PORT,
        region_name: strip_path_unsafe(site.region.as_deref().unwrap_or(NO_REGION)),
        tenant_name: strip_path_unsafe(entity.tenant.as_deref().unwrap_or(NO_TENANT)),
        site_name: strip_path_unsafe(&site.display),
        site_group: site.group.clone().unwrap_or_default(),
        site_address: flatten_address(&site.physical_address),
        virtual_chassis_name: entity.virtual_chassis.clone().unwrap_or_default(),
        is_console_session: matches!(kind, SyncKind::Console { .. }),
        console_server_port,
        extras,
    })
}
