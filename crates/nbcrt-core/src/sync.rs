// ── Sync engine ──
//
// One run: fetch the inventory, resolve every session, write them, then
// delete what is no longer desired. Resolution completes for the whole
// inventory before the first file is written, so a bad record aborts the
// run with the session tree untouched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::environment::{Environment, SiteIndex, SyncKind, build_environment};
use crate::error::CoreError;
use crate::eval::Evaluator;
use crate::model::{Entity, Inventory, SessionDescriptor};
use crate::pipeline::Resolver;
use crate::source::InventorySource;
use crate::store::{SessionStore, StoredSession, WriteOutcome};

// ── SyncStatus ───────────────────────────────────────────────────

/// Phase of a running sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncStage {
    #[strum(to_string = "Connecting to NetBox")]
    Connecting,
    #[strum(to_string = "Fetching inventory")]
    Fetching,
    #[strum(to_string = "Resolving sessions")]
    Resolving,
    #[strum(to_string = "Writing session files")]
    Writing,
    #[strum(to_string = "Removing stale sessions")]
    Reconciling,
}

/// Sync state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Running(SyncStage),
    Succeeded {
        finished_at: DateTime<Utc>,
        sessions: usize,
    },
    Failed {
        message: String,
    },
}

// ── Reports ──────────────────────────────────────────────────────

/// The desired session set for one inventory snapshot.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub sessions: Vec<SessionDescriptor>,
    /// Entities rejected by the configured filters.
    pub filtered: usize,
}

/// What a completed run changed.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sessions: usize,
    pub filtered: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub pruned: usize,
}

/// A planned session and what writing it would do.
#[derive(Debug, Clone)]
pub struct PlannedSession {
    pub session: SessionDescriptor,
    pub outcome: WriteOutcome,
}

/// What a run would do, computed without touching the session tree.
#[derive(Debug, Clone)]
pub struct Preview {
    pub sessions: Vec<PlannedSession>,
    pub filtered: usize,
    pub stale: Vec<StoredSession>,
}

// ── SyncEngine ───────────────────────────────────────────────────

/// Drives sync runs against one inventory source and one session root.
///
/// Runs must not overlap; the caller schedules them.
pub struct SyncEngine<S> {
    source: S,
    config: SyncConfig,
    store: SessionStore,
    evaluator: Evaluator,
    status: watch::Sender<SyncStatus>,
}

impl<S: InventorySource> SyncEngine<S> {
    pub fn new(source: S, config: SyncConfig, store: SessionStore) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            source,
            config,
            store,
            evaluator: Evaluator::new(),
            status,
        }
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn set_stage(&self, stage: SyncStage) {
        debug!(%stage, "sync stage");
        self.status.send_replace(SyncStatus::Running(stage));
    }

    /// Run one full sync.
    pub async fn run(&self) -> Result<SyncReport, CoreError> {
        let result = self.execute().await;
        match &result {
            Ok(report) => {
                self.status.send_replace(SyncStatus::Succeeded {
                    finished_at: report.finished_at,
                    sessions: report.sessions,
                });
            }
            Err(e) => {
                warn!(error = %e, "sync failed");
                self.status.send_replace(SyncStatus::Failed {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Fetch and resolve, then report what `run` would change.
    pub async fn preview(&self) -> Result<Preview, CoreError> {
        let result: Result<Preview, CoreError> = async {
            let inventory = self.fetch().await?;
            self.set_stage(SyncStage::Resolving);
            let plan = self.plan(&inventory)?;
            let stale = self.store.stale_sessions(&plan.sessions).await?;

            let mut sessions = Vec::with_capacity(plan.sessions.len());
            for session in plan.sessions {
                let outcome = self.store.check_session(&session).await?;
                sessions.push(PlannedSession { session, outcome });
            }
            Ok(Preview {
                sessions,
                filtered: plan.filtered,
                stale,
            })
        }
        .await;
        self.status.send_replace(match &result {
            Ok(_) => SyncStatus::Idle,
            Err(e) => SyncStatus::Failed {
                message: e.to_string(),
            },
        });
        result
    }

    async fn execute(&self) -> Result<SyncReport, CoreError> {
        let started_at = Utc::now();
        info!(root = %self.store.root().display(), "sync started");

        let inventory = self.fetch().await?;

        self.set_stage(SyncStage::Resolving);
        let plan = self.plan(&inventory)?;

        self.set_stage(SyncStage::Writing);
        let (mut created, mut updated, mut unchanged) = (0, 0, 0);
        for session in &plan.sessions {
            match self.store.write_session(session).await? {
                WriteOutcome::Created => created += 1,
                WriteOutcome::Updated => updated += 1,
                WriteOutcome::Unchanged => unchanged += 1,
            }
        }

        self.set_stage(SyncStage::Reconciling);
        let reconciled = self.store.reconcile(&plan.sessions).await?;

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            sessions: plan.sessions.len(),
            filtered: plan.filtered,
            created,
            updated,
            unchanged,
            deleted: reconciled.deleted.len(),
            pruned: reconciled.pruned.len(),
        };
        info!(
            sessions = report.sessions,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            "sync finished"
        );
        Ok(report)
    }

    /// Fetch every collection the configuration asks for.
    pub async fn fetch(&self) -> Result<Inventory, CoreError> {
        self.set_stage(SyncStage::Connecting);
        self.source.test_connection().await?;

        self.set_stage(SyncStage::Fetching);
        let virtual_machines = async {
            if self.config.virtual_machines {
                self.source.list_virtual_machines().await
            } else {
                Ok(Vec::new())
            }
        };
        let console_ports = async {
            if self.config.console_sessions {
                self.source.list_console_server_ports().await
            } else {
                Ok(Vec::new())
            }
        };
        let (sites, devices, virtual_machines, console_ports) = tokio::join!(
            self.source.list_sites(),
            self.source.list_devices(),
            virtual_machines,
            console_ports,
        );

        let inventory = Inventory {
            sites: sites?,
            devices: devices?,
            virtual_machines: virtual_machines?,
            console_ports: console_ports?,
        };
        debug!(
            sites = inventory.sites.len(),
            devices = inventory.devices.len(),
            virtual_machines = inventory.virtual_machines.len(),
            console_ports = inventory.console_ports.len(),
            "inventory fetched"
        );
        Ok(inventory)
    }

    /// Resolve the complete desired session set for `inventory`.
    ///
    /// Fails on the first entity that cannot be resolved.
    pub fn plan(&self, inventory: &Inventory) -> Result<Plan, CoreError> {
        let sites = SiteIndex::new(&inventory.sites);
        let resolver = Resolver::new(&self.evaluator, &self.config);
        let mut planner = Planner {
            resolver: &resolver,
            plan: Plan::default(),
            seen: HashMap::new(),
        };

        for device in &inventory.devices {
            planner.admit(&build_environment(device, &sites, SyncKind::Direct)?)?;
        }

        if self.config.virtual_machines {
            for vm in &inventory.virtual_machines {
                planner.admit(&build_environment(vm, &sites, SyncKind::Direct)?)?;
            }
        }

        if self.config.console_sessions {
            let devices: HashMap<i64, &Entity> =
                inventory.devices.iter().map(|d| (d.id, d)).collect();

            for port in inventory.console_ports.iter().filter(|p| p.is_connected()) {
                let server = devices.get(&port.server_id).ok_or_else(|| {
                    CoreError::ConsoleServerNotFound {
                        device: port.server_name.clone(),
                        port: port.name.clone(),
                    }
                })?;
                let Some(target) = port.endpoint_id.and_then(|id| devices.get(&id)) else {
                    warn!(
                        server = %port.server_name,
                        port = %port.name,
                        endpoint = port.endpoint_name.as_deref().unwrap_or_default(),
                        "console port is cabled to a device without a primary IP, skipping"
                    );
                    continue;
                };
                let kind = SyncKind::Console { port, server };
                planner.admit(&build_environment(target, &sites, kind)?)?;
            }
        }

        let plan = planner.plan;
        debug!(sessions = plan.sessions.len(), filtered = plan.filtered, "plan resolved");
        Ok(plan)
    }
}

/// Accumulates resolved sessions for one `plan` call.
struct Planner<'r, 'a> {
    resolver: &'r Resolver<'a>,
    plan: Plan,
    /// Device name to path of sessions already planned.
    seen: HashMap<String, String>,
}

impl Planner<'_, '_> {
    fn admit(&mut self, env: &Environment) -> Result<(), CoreError> {
        let session = self.resolver.resolve(env)?;

        if !self.resolver.is_selected(env, &session) {
            debug!(device = %session.device_name, "excluded by filter");
            self.plan.filtered += 1;
            return Ok(());
        }

        if let Some(previous) = self.seen.insert(session.device_name.clone(), session.path.clone()) {
            warn!(
                device = %session.device_name,
                first = %previous,
                second = %session.path,
                "duplicate session name"
            );
        }
        self.plan.sessions.push(session);
        Ok(())
    }
}
