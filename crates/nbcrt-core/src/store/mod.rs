// ── Session store ──
//
// The on-disk set of session files below one SecureCRT session root:
// `<root>/<path>/<device_name>.ini`. Reads decode through `codec.rs`;
// files that fail to read or decode are skipped, never deleted.

mod reconcile;

use std::io;
use std::path::{Path, PathBuf};

use futures_util::{StreamExt, stream};
use serde::Serialize;
use strum::Display;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::codec;
use crate::error::CoreError;
use crate::model::SessionDescriptor;

pub use reconcile::ReconcileReport;

pub const SESSION_EXTENSION: &str = "ini";
const DEFAULT_SCAN_CONCURRENCY: usize = 16;

/// A session file found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub file: PathBuf,
    pub descriptor: SessionDescriptor,
}

/// What `write_session` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    header: String,
    scan_concurrency: usize,
}

impl SessionStore {
    /// `header` is written verbatim at the top of every session file.
    pub fn new(root: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            header: header.into(),
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }

    /// Maximum number of files read in parallel while scanning.
    pub fn with_scan_concurrency(mut self, limit: usize) -> Self {
        self.scan_concurrency = limit.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_file(&self, session: &SessionDescriptor) -> PathBuf {
        let mut file = self.root.clone();
        file.extend(session.path.split('/').filter(|part| !part.is_empty()));
        file.push(format!("{}.{SESSION_EXTENSION}", session.device_name));
        file
    }

    /// Write one session file, creating folders as needed.
    ///
    /// A file whose bytes already match is left untouched.
    pub async fn write_session(&self, session: &SessionDescriptor) -> Result<WriteOutcome, CoreError> {
        let file = self.session_file(session);
        let content = codec::encode(&self.header, session);
        let write_err = |source| CoreError::Write {
            path: file.clone(),
            source,
        };

        let outcome = compare(&file, &content).await.map_err(write_err)?;
        if outcome == WriteOutcome::Unchanged {
            return Ok(outcome);
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&file, content).await.map_err(write_err)?;

        debug!(device = %session.device_name, file = %file.display(), ?outcome, "session written");
        Ok(outcome)
    }

    /// What `write_session` would do, without writing.
    pub async fn check_session(&self, session: &SessionDescriptor) -> Result<WriteOutcome, CoreError> {
        let file = self.session_file(session);
        let content = codec::encode(&self.header, session);
        compare(&file, &content)
            .await
            .map_err(|source| CoreError::Scan { path: file, source })
    }

    /// Every decodable session below the root, sorted by file path.
    pub async fn list_sessions(&self) -> Result<Vec<StoredSession>, CoreError> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || session_files(&root))
            .await
            .map_err(|e| CoreError::Scan {
                path: self.root.clone(),
                source: io::Error::other(e),
            })??;

        let results: Vec<(PathBuf, Result<StoredSession, CoreError>)> = stream::iter(files)
            .map(|file| async move {
                let result = self.read_session(&file).await;
                (file, result)
            })
            .buffer_unordered(self.scan_concurrency)
            .collect()
            .await;

        let mut sessions = Vec::with_capacity(results.len());
        for (file, result) in results {
            match result {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable session file"),
            }
        }
        sessions.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(sessions)
    }

    async fn read_session(&self, file: &Path) -> Result<StoredSession, CoreError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| CoreError::Scan {
            path: file.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let device_name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut descriptor = SessionDescriptor::named(device_name, self.folder_of(file));
        codec::decode(&content, &mut descriptor).map_err(|source| CoreError::Codec {
            path: file.to_path_buf(),
            source,
        })?;

        Ok(StoredSession {
            file: file.to_path_buf(),
            descriptor,
        })
    }

    /// `/`-joined folder of `file` relative to the root.
    fn folder_of(&self, file: &Path) -> String {
        file.parent()
            .and_then(|parent| parent.strip_prefix(&self.root).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

async fn compare(file: &Path, content: &str) -> io::Result<WriteOutcome> {
    match tokio::fs::read(file).await {
        Ok(existing) if existing == content.as_bytes() => Ok(WriteOutcome::Unchanged),
        Ok(_) => Ok(WriteOutcome::Updated),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(WriteOutcome::Created),
        Err(e) => Err(e),
    }
}

/// SecureCRT keeps folder metadata in `__Name__.ini` files; those are not
/// sessions.
fn is_bookkeeping(stem: &str) -> bool {
    stem.len() > 4 && stem.starts_with("__") && stem.ends_with("__")
}

fn session_files(root: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| CoreError::Scan {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_session = path.extension().is_some_and(|ext| ext == SESSION_EXTENSION)
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| !is_bookkeeping(stem));
        if is_session {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Firewall;
    use pretty_assertions::assert_eq;

    pub(super) fn descriptor(name: &str, path: &str) -> SessionDescriptor {
        SessionDescriptor {
            device_name: name.into(),
            path: path.into(),
            ip: "10.0.0.1".into(),
            port: 22,
            protocol: "SSH2".into(),
            description: "Site: Copenhagen\nType: Switch".into(),
            credential: None,
            firewall: Firewall::Disabled,
        }
    }

    #[tokio::test]
    async fn write_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "S:\"Username\"=\n");

        let a = descriptor("sw-01", "Acme/Denmark/Copenhagen/Switch");
        let b = descriptor("rtr-01", "");
        store.write_session(&a).await.unwrap();
        store.write_session(&b).await.unwrap();

        assert!(dir.path().join("Acme/Denmark/Copenhagen/Switch/sw-01.ini").is_file());

        let listed = store.list_sessions().await.unwrap();
        let descriptors: Vec<_> = listed.into_iter().map(|s| s.descriptor).collect();
        assert_eq!(descriptors, vec![a, b]);
    }

    #[tokio::test]
    async fn rewrite_reports_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "");
        let mut session = descriptor("sw-01", "Site");

        assert_eq!(store.check_session(&session).await.unwrap(), WriteOutcome::Created);
        assert!(!store.session_file(&session).exists());
        assert_eq!(store.write_session(&session).await.unwrap(), WriteOutcome::Created);
        assert_eq!(store.write_session(&session).await.unwrap(), WriteOutcome::Unchanged);
        session.ip = "10.0.0.2".into();
        assert_eq!(store.check_session(&session).await.unwrap(), WriteOutcome::Updated);
        assert_eq!(store.write_session(&session).await.unwrap(), WriteOutcome::Updated);
    }

    #[tokio::test]
    async fn missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("does-not-exist"), "");
        assert!(store.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_bookkeeping_foreign_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path(), "").with_scan_concurrency(2);
        store.write_session(&descriptor("sw-01", "Site")).await.unwrap();

        let site = dir.path().join("Site");
        std::fs::write(site.join("__FolderData__.ini"), "S:\"Folder\"=x\n").unwrap();
        std::fs::write(site.join("notes.txt"), "hello").unwrap();
        std::fs::write(site.join("broken.ini"), "Z:\"Description\"=00000009\n only\n").unwrap();

        let listed = store.list_sessions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].descriptor.device_name, "sw-01");
        assert_eq!(listed[0].descriptor.path, "Site");
    }
}
