//! Bare clone creation and refresh.

use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::WorktreeManager;
use super::git;
use crate::errors::{LabError, LabResult};

/// File inside each bare clone recording the source project it mirrors.
/// Written once at clone time and never rewritten.
pub const SOURCE_MARKER: &str = "lab-source-project";

impl WorktreeManager {
    /// Return the bare clone for `source`, creating it on first use and
    /// refreshing it otherwise.
    ///
    /// The clone lives at `<repos>/<project_name>.git`. When that directory
    /// already mirrors a different source path, a sibling named
    /// `<project_name>-<hash>.git` is used instead.
    pub fn ensure_bare_repo(&self, source: &Path, project_name: &str) -> LabResult<PathBuf> {
        std::fs::create_dir_all(&self.repos_dir).context("Failed to create repos directory")?;

        let mut bare = self.repos_dir.join(format!("{}.git", project_name));
        if bare.is_dir() && recorded_source(&bare).as_deref() != Some(&*source.to_string_lossy()) {
            let hashed = self
                .repos_dir
                .join(format!("{}-{}.git", project_name, source_hash(source)));
            info!(
                taken = %bare.display(),
                using = %hashed.display(),
                "bare repo name belongs to another source project"
            );
            bare = hashed;
        }

        if bare.is_dir() {
            refresh_bare_repo(&bare, source);
            return Ok(bare);
        }

        create_bare_repo(&bare, source)?;
        Ok(bare)
    }
}

fn recorded_source(bare: &Path) -> Option<String> {
    std::fs::read_to_string(bare.join(SOURCE_MARKER))
        .ok()
        .map(|s| s.trim_end_matches('\n').to_string())
}

/// First eight hex characters of the SHA-256 of the source path.
pub(crate) fn source_hash(source: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())[..8].to_string()
}

/// Fetch upstream and local branches. A stale cache is still usable, so
/// failures are logged and otherwise ignored.
fn refresh_bare_repo(bare: &Path, source: &Path) {
    info!(bare = %bare.display(), "refreshing bare repo");
    git::best_effort(
        git::git_in(bare).args(["fetch", "--all", "--prune"]),
        "fetch all remotes",
    );
    git::fetch_local_branches(bare, source);
}

fn create_bare_repo(bare: &Path, source: &Path) -> LabResult<()> {
    let setup_error = |message: String| LabError::RepoSetup {
        source_path: source.to_path_buf(),
        message,
    };

    let cloned_from_upstream = match git::origin_url(source) {
        Some(upstream) => {
            info!(%upstream, bare = %bare.display(), "cloning bare repo from upstream");
            match git::clone_bare(&upstream, bare) {
                Ok(output) if output.status.success() => true,
                Ok(output) => {
                    warn!(%upstream, output = %git::combined_output(&output), "upstream clone failed, cloning local source");
                    false
                }
                Err(e) => {
                    warn!(%upstream, error = %e, "upstream clone failed, cloning local source");
                    false
                }
            }
        }
        None => false,
    };

    if cloned_from_upstream {
        // Picks up commits and branches not yet pushed upstream.
        git::fetch_local_branches(bare, source);
    } else {
        if bare.exists()
            && let Err(e) = std::fs::remove_dir_all(bare)
        {
            warn!(bare = %bare.display(), error = %e, "could not clear partial clone");
        }
        info!(source = %source.display(), bare = %bare.display(), "cloning bare repo from local source");
        let output = git::clone_bare(source, bare).map_err(|e| setup_error(format!("{:#}", e)))?;
        if !output.status.success() {
            return Err(setup_error(format!(
                "git clone --bare failed: {}",
                git::combined_output(&output)
            )));
        }
    }

    std::fs::write(bare.join(SOURCE_MARKER), source.to_string_lossy().as_bytes())
        .map_err(|e| setup_error(format!("Failed to write {}: {}", SOURCE_MARKER, e)))?;
    Ok(())
}
