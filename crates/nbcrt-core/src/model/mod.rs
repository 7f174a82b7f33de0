// ── Domain model ──
//
// The inventory snapshot consumed by one sync run and the session
// descriptor it produces. NetBox response shapes are converted into these
// types in `convert.rs`; nothing here knows about HTTP.

pub mod console;
pub mod entity;
pub mod session;
pub mod site;

// ── Re-exports ──────────────────────────────────────────────────────

pub use console::ConsolePort;
pub use entity::{Entity, EntityKind, Tag};
pub use session::{Firewall, SessionDescriptor};
pub use site::Site;

/// Everything fetched from the inventory source for one run.
///
/// Immutable once built: the engine only reads from it.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub sites: Vec<Site>,
    pub devices: Vec<Entity>,
    pub virtual_machines: Vec<Entity>,
    pub console_ports: Vec<ConsolePort>,
}
