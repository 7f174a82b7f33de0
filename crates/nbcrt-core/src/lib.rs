//! Session synthesis engine between `nbcrt-api` and the CLI.
//!
//! This crate turns a NetBox inventory snapshot into SecureCRT session files
//! and keeps the session tree in step with the inventory:
//!
//! - **[`SyncEngine`]**: orchestrates one run (fetch, resolve, write,
//!   reconcile) and publishes a [`SyncStatus`] over a `watch` channel.
//!
//! - **Environment builder** ([`environment`]): flattens an entity and its
//!   site into the typed [`Environment`] that templates and rules read.
//!
//! - **[`Evaluator`]**: `{field}` templates and `{{ expression }}` snippets
//!   with a per-instance cache of compiled programs.
//!
//! - **[`Resolver`]**: default templates, ordered override rules and filters.
//!
//! - **[`SessionStore`]**: reads and writes `.ini` session files through the
//!   field-table [`codec`], and reconciles the tree against a desired set.
//!
//! - **[`InventorySource`]**: the read-only CMDB contract, implemented for
//!   [`nbcrt_api::NetBoxClient`].

pub mod codec;
pub mod config;
pub mod convert;
pub mod environment;
pub mod error;
pub mod eval;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{OverrideRule, OverrideTarget, SessionTemplates, SyncConfig};
pub use environment::{Environment, SiteIndex, SyncKind, build_environment};
pub use error::CoreError;
pub use eval::{EvalError, Evaluator, Scope};
pub use pipeline::Resolver;
pub use source::InventorySource;
pub use store::{ReconcileReport, SessionStore, StoredSession, WriteOutcome};
pub use sync::{Plan, PlannedSession, Preview, SyncEngine, SyncReport, SyncStage, SyncStatus};

pub use model::{ConsolePort, Entity, EntityKind, Firewall, Inventory, SessionDescriptor, Site, Tag};
