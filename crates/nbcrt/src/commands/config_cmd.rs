//! Config subcommand handlers.

use secrecy::ExposeSecret;

use nbcrt_config::ConfigFormat;

use super::Context;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&ctx.path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show { toml } => {
            let out = match global.output {
                OutputFormat::Json | OutputFormat::JsonCompact => output::render_single(
                    global.output,
                    &ctx.config.masked(),
                    |_| String::new(),
                    |_| String::new(),
                )?,
                _ if toml => nbcrt_config::render(&ctx.config, ConfigFormat::Toml)?,
                _ => nbcrt_config::render(&ctx.config, ConfigFormat::Yaml)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Validate => {
            let checks = validate(ctx, global)?;
            let lines: Vec<String> = checks
                .iter()
                .map(|(label, value)| format!("✓ {label:<14} {value}"))
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }
    }
}

/// Run every offline check; each passing check yields a label and detail.
fn validate(ctx: &Context, global: &GlobalOpts) -> Result<Vec<(&'static str, String)>, CliError> {
    ctx.require_config()?;
    let config = &ctx.config;
    config.validate()?;
    let sync = config.sync_config()?;

    let token_source = if global.token.is_some() {
        "--token".to_owned()
    } else {
        let token = nbcrt_config::resolve_token(config)?;
        format!("resolved ({} characters)", token.expose_secret().len())
    };

    let securecrt = config.securecrt_dir()?;
    config.session_header()?;

    Ok(vec![
        ("config file", ctx.path.display().to_string()),
        ("netbox", config.netbox_base_url()?.to_string()),
        ("token", token_source),
        ("securecrt", securecrt.display().to_string()),
        ("session root", config.session_root()?.display().to_string()),
        (
            "rules",
            format!("{} overrides, {} filters", sync.overrides.len(), sync.filters.len()),
        ),
    ])
}
