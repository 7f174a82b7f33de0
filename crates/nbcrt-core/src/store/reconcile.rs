// ── Reconciliation ──
//
// Deletes sessions that are no longer desired, then walks upward from each
// deleted file removing folders left with nothing but SecureCRT metadata.
// Never touches the root or anything outside it.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{SessionStore, StoredSession};
use crate::error::CoreError;
use crate::model::SessionDescriptor;

/// Files that do not keep a folder alive.
pub const IGNORED_FILES: &[&str] = &[".DS_Store", "__FolderData__.ini"];

/// What one reconcile pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

impl SessionStore {
    /// Remove every stored session whose device name is not in `desired`.
    ///
    /// Must only be called once the complete desired set is known.
    pub async fn reconcile(&self, desired: &[SessionDescriptor]) -> Result<ReconcileReport, CoreError> {
        let mut report = ReconcileReport::default();

        for stale in self.stale_sessions(desired).await? {
            match tokio::fs::remove_file(&stale.file).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CoreError::Delete {
                        path: stale.file,
                        source,
                    });
                }
            }
            info!(
                device = %stale.descriptor.device_name,
                file = %stale.file.display(),
                "removed stale session"
            );

            if let Some(parent) = stale.file.parent() {
                self.prune_upward(parent, &mut report.pruned).await?;
            }
            report.deleted.push(stale.file);
        }

        Ok(report)
    }

    /// Stored sessions whose device name is not in `desired`.
    pub async fn stale_sessions(
        &self,
        desired: &[SessionDescriptor],
    ) -> Result<Vec<StoredSession>, CoreError> {
        let wanted: HashSet<&str> = desired.iter().map(|d| d.device_name.as_str()).collect();
        let mut stored = self.list_sessions().await?;
        stored.retain(|s| !wanted.contains(s.descriptor.device_name.as_str()));
        Ok(stored)
    }

    async fn prune_upward(&self, start: &Path, pruned: &mut Vec<PathBuf>) -> Result<(), CoreError> {
        let mut dir = start.to_path_buf();

        while dir != self.root && dir.starts_with(&self.root) {
            let Some(leftovers) = prunable_contents(&dir).await? else {
                break;
            };
            for file in leftovers {
                remove(&file, tokio::fs::remove_file(&file).await)?;
            }
            // `remove_dir` refuses non-empty folders, so a file created
            // concurrently keeps the folder.
            remove(&dir, tokio::fs::remove_dir(&dir).await)?;
            debug!(dir = %dir.display(), "pruned empty folder");
            pruned.push(dir.clone());

            if !dir.pop() {
                break;
            }
        }
        Ok(())
    }
}

fn remove(path: &Path, result: io::Result<()>) -> Result<(), CoreError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CoreError::Delete {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The ignorable files in `dir`, or `None` if anything else is there.
async fn prunable_contents(dir: &Path) -> Result<Option<Vec<PathBuf>>, CoreError> {
    let scan_err = |source| CoreError::Scan {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(scan_err(e)),
    };

    let mut leftovers = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let ignorable = entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_FILES.contains(&name));
        if !ignorable || entry.file_type().await.map_err(scan_err)?.is_dir() {
            return Ok(None);
        }
        leftovers.push(entry.path());
    }
    Ok(Some(leftovers))
}
