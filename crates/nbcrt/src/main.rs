mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use nbcrt_config::Config;

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let path = cli.global.config.clone().unwrap_or_else(nbcrt_config::config_path);
    let loaded = nbcrt_config::load_config(&path);

    let level = loaded.as_ref().ok().map(|config| config.log_level.as_str());
    let _guard = init_tracing(cli.global.verbose, level);

    if let Err(err) = run(cli, path, loaded).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// stderr at the requested verbosity plus a daily log file when the data
/// directory is writable. `RUST_LOG` wins over both.
fn init_tracing(verbosity: u8, config_level: Option<&str>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => config_level.unwrap_or("warn").to_ascii_lowercase(),
        1 => "info".into(),
        2 => "debug".into(),
        _ => "trace".into(),
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let (file_layer, guard) = match log_appender() {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .with(file_layer)
        .init();

    guard
}

fn log_appender() -> Option<RollingFileAppender> {
    let dir = nbcrt_config::data_dir()?.join("logs");
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("nbcrt")
        .filename_suffix("log")
        .max_log_files(14)
        .build(dir)
        .ok()
}

async fn run(
    cli: Cli,
    path: PathBuf,
    loaded: Result<Config, nbcrt_config::ConfigError>,
) -> Result<(), CliError> {
    match cli.command {
        // Completions don't need a config
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "nbcrt", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let ctx = Context::new(path, loaded?, &cli.global);
            tracing::debug!(command = ?cmd, config = %ctx.path.display(), "dispatching command");
            commands::dispatch(cmd, &ctx, &cli.global).await
        }
    }
}
