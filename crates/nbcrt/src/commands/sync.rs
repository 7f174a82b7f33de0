//! `nbcrt sync`: one run, or a dry-run preview.

use serde::Serialize;
use tabled::Tabled;

use nbcrt_core::{Preview, SyncReport};

use super::Context;
use super::progress::Progress;
use crate::cli::{GlobalOpts, SyncArgs};
use crate::error::CliError;
use crate::output;

/// One line of a dry-run preview.
#[derive(Debug, Serialize, Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Session")]
    device: String,
    #[tabled(rename = "Folder")]
    path: String,
    #[tabled(rename = "Hostname")]
    ip: String,
}

pub async fn handle(args: SyncArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let engine = ctx.engine(global)?;
    let progress = Progress::start(engine.subscribe(), global.quiet);

    if args.dry_run {
        let preview = engine.preview().await;
        progress.finish();
        let rows = change_rows(preview?);
        let color = output::should_color(global.color);
        let out = output::render_list(
            global.output,
            &rows,
            |row| ChangeRow {
                action: output::paint_action(&row.action, color),
                device: row.device.clone(),
                path: row.path.clone(),
                ip: row.ip.clone(),
            },
            |row| format!("{} {}", row.action, row.device),
        )?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let report = engine.run().await;
    progress.finish();
    let out = output::render_single(global.output, &report?, summary, |r| r.sessions.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Changed sessions first, unchanged ones omitted.
fn change_rows(preview: Preview) -> Vec<ChangeRow> {
    let mut rows: Vec<ChangeRow> = preview
        .sessions
        .into_iter()
        .filter(|planned| planned.outcome != nbcrt_core::WriteOutcome::Unchanged)
        .map(|planned| ChangeRow {
            action: planned.outcome.to_string(),
            device: planned.session.device_name,
            path: planned.session.path,
            ip: planned.session.ip,
        })
        .collect();
    rows.extend(preview.stale.into_iter().map(|stale| ChangeRow {
        action: "deleted".into(),
        device: stale.descriptor.device_name,
        path: stale.descriptor.path,
        ip: stale.descriptor.ip,
    }));
    rows
}

fn summary(report: &SyncReport) -> String {
    let took = (report.finished_at - report.started_at)
        .to_std()
        .unwrap_or_default();
    format!(
        "Synced {} sessions in {}\n  created:   {}\n  updated:   {}\n  unchanged: {}\n  deleted:   {}\n  filtered:  {}\n  pruned folders: {}",
        report.sessions,
        humantime::format_duration(round_to_millis(took)),
        report.created,
        report.updated,
        report.unchanged,
        report.deleted,
        report.filtered,
        report.pruned,
    )
}

fn round_to_millis(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use nbcrt_core::{PlannedSession, SessionDescriptor, StoredSession, WriteOutcome};

    use super::*;

    fn session(name: &str) -> SessionDescriptor {
        let mut session = SessionDescriptor::named(name, "Acme/Site");
        session.ip = "10.0.0.1".into();
        session
    }

    #[test]
    fn preview_rows_skip_unchanged_and_list_deletions() {
        let preview = Preview {
            sessions: vec![
                PlannedSession {
                    session: session("sw-01"),
                    outcome: WriteOutcome::Created,
                },
                PlannedSession {
                    session: session("sw-02"),
                    outcome: WriteOutcome::Unchanged,
                },
            ],
            filtered: 0,
            stale: vec![StoredSession {
                file: "Acme/Site/old.ini".into(),
                descriptor: session("old"),
            }],
        };

        let rows = change_rows(preview);
        let actions: Vec<_> = rows.iter().map(|r| (r.action.as_str(), r.device.as_str())).collect();
        assert_eq!(actions, vec![("created", "sw-01"), ("deleted", "old")]);
    }

    #[test]
    fn summary_lists_counts() {
        let started_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).single().unwrap_or_default();
        let report = SyncReport {
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(1500),
            sessions: 12,
            filtered: 1,
            created: 2,
            updated: 1,
            unchanged: 9,
            deleted: 3,
            pruned: 1,
        };
        let text = summary(&report);
        assert!(text.starts_with("Synced 12 sessions in 1s 500ms"));
        assert!(text.contains("deleted:   3"));
    }
}
