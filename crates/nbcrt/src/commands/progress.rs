//! Spinner driven by the engine's status channel.

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use nbcrt_core::SyncStatus;

pub struct Progress {
    bar: Option<ProgressBar>,
    task: Option<JoinHandle<()>>,
}

impl Progress {
    /// Show a spinner on an interactive stderr unless `quiet`.
    pub fn start(mut status: watch::Receiver<SyncStatus>, quiet: bool) -> Self {
        if quiet || !io::stderr().is_terminal() {
            return Self {
                bar: None,
                task: None,
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        let spinner = bar.clone();
        let task = tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let stage = match &*status.borrow_and_update() {
                    SyncStatus::Running(stage) => Some(stage.to_string()),
                    _ => None,
                };
                if let Some(stage) = stage {
                    spinner.set_message(stage);
                }
            }
        });

        Self {
            bar: Some(bar),
            task: Some(task),
        }
    }

    pub fn finish(self) {
        if let Some(task) = self.task {
            task.abort();
        }
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
