//! `nbcrt sessions list`.

use serde::Serialize;
use tabled::Tabled;

use nbcrt_core::StoredSession;

use super::Context;
use crate::cli::{GlobalOpts, SessionsArgs, SessionsCommand};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
struct SessionRow {
    #[tabled(rename = "Session")]
    name: String,
    #[tabled(rename = "Folder")]
    path: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Credential")]
    credential: String,
    #[tabled(rename = "Firewall")]
    firewall: String,
}

impl From<&StoredSession> for SessionRow {
    fn from(stored: &StoredSession) -> Self {
        let d = &stored.descriptor;
        Self {
            name: d.device_name.clone(),
            path: d.path.clone(),
            hostname: d.ip.clone(),
            port: d.port,
            protocol: d.protocol.clone(),
            credential: d.credential.clone().unwrap_or_default(),
            firewall: d.firewall.to_string(),
        }
    }
}

pub async fn handle(args: SessionsArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SessionsCommand::List { path } => {
            let store = ctx.store()?;
            let mut sessions = store.list_sessions().await?;
            if let Some(prefix) = path {
                let prefix = prefix.trim_matches('/').to_owned();
                sessions.retain(|s| in_folder(&s.descriptor.path, &prefix));
            }

            let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
            let out = output::render_list(
                global.output,
                &rows,
                SessionRow::clone,
                |row| row.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

/// Whether `path` is `folder` or below it.
fn in_folder(path: &str, folder: &str) -> bool {
    folder.is_empty()
        || path == folder
        || path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::in_folder;

    #[test]
    fn folder_prefix_matches_whole_components() {
        assert!(in_folder("Acme/Denmark/CPH", "Acme"));
        assert!(in_folder("Acme", "Acme"));
        assert!(!in_folder("AcmeCorp/Denmark", "Acme"));
        assert!(in_folder("anything", ""));
    }
}
