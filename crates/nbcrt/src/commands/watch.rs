//! `nbcrt watch`: sync immediately, then every interval until Ctrl-C.
//!
//! A failed run is logged and the next tick tries again; only setup errors
//! end the command.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::Context;
use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let interval = args.interval.unwrap_or_else(|| ctx.config.periodic_interval());
    if interval < Duration::from_secs(1) {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least one second".into(),
        });
    }

    let engine = ctx.engine(global)?;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval = %humantime::format_duration(interval), "watching NetBox");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.run().await {
                    Ok(report) => output::print_output(
                        &format!(
                            "{} synced {} sessions ({} created, {} updated, {} deleted)",
                            report.finished_at.format("%Y-%m-%d %H:%M:%S"),
                            report.sessions,
                            report.created,
                            report.updated,
                            report.deleted,
                        ),
                        global.quiet,
                    ),
                    Err(e) => error!(
                        device = e.device().unwrap_or_default(),
                        error = %e,
                        "sync run failed, retrying next interval"
                    ),
                }
            }
            _ = &mut shutdown => {
                info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}
