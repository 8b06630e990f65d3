use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::LabManager;
use crate::errors::{LabError, LabResult};
use crate::profile::is_snapshot_profile;
use crate::state::LabRecord;

/// Outcome of [`LabManager::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    Complete,
    /// The lab was the last worktree of its bare repository. The repository
    /// is left in place; delete it with [`LabManager::remove_bare_repo`]
    /// once the user agrees.
    BareRepoCleanupPrompt { bare_repo: PathBuf },
}

impl LabManager {
    /// Tear a lab down as far as possible.
    ///
    /// Container, volumes, worktree and record are removed in that order.
    /// A failing step is logged and the next one still runs.
    pub fn remove(&self, lab: &LabRecord) -> Teardown {
        let engine = &self.collab.engine;

        match engine.find_container(&lab.worktree, true) {
            Ok(Some(id)) => {
                info!(lab = %lab.display_name, container = %id, "removing container");
                if let Err(e) = engine.remove_container(&id) {
                    warn!(container = %id, error = %e, "could not remove container");
                }
            }
            Ok(None) => debug!(lab = %lab.display_name, "no container to remove"),
            Err(e) => warn!(lab = %lab.display_name, error = %e, "could not look up container"),
        }

        match engine.list_volumes(&lab.id) {
            Ok(volumes) => {
                if let Err(e) = engine.remove_volumes(&volumes) {
                    warn!(?volumes, error = %e, "could not remove volumes");
                }
            }
            Err(e) => warn!(lab = %lab.id, error = %e, "could not list volumes"),
        }

        if let Err(e) = self.worktrees.remove_worktree(&lab.bare_repo, &lab.worktree) {
            warn!(worktree = %lab.worktree.display(), error = %e, "could not remove worktree");
        }

        if let Err(e) = self.store.delete(&lab.id) {
            warn!(lab = %lab.id, error = %e, "could not delete lab record");
        }

        if let Some(snapshot) = lab.snapshot.as_deref().filter(|s| is_snapshot_profile(s))
            && let Err(e) = self.collab.snapshots.cleanup_snapshot(snapshot)
        {
            warn!(profile = snapshot, error = %e, "could not remove snapshot profile");
        }

        match self.worktrees.worktree_count(&lab.bare_repo) {
            Ok(count) if count <= 1 => Teardown::BareRepoCleanupPrompt {
                bare_repo: lab.bare_repo.clone(),
            },
            Ok(_) => Teardown::Complete,
            Err(e) => {
                debug!(bare_repo = %lab.bare_repo.display(), error = %e, "could not count worktrees");
                Teardown::Complete
            }
        }
    }

    /// Delete a cached bare repository. Only paths inside the repos
    /// directory are accepted.
    pub fn remove_bare_repo(&self, bare_repo: &Path) -> LabResult<()> {
        if !self.is_inside_repos(bare_repo) {
            return Err(LabError::Validation {
                what: "bare repository",
                value: bare_repo.display().to_string(),
                reason: "not inside the devlab repository cache",
            });
        }
        match std::fs::remove_dir_all(bare_repo) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
