//! Bare-repository cache and git worktree management.
//!
//! Every source project gets one bare clone under the repos directory, and
//! every lab gets one worktree of that clone on its own branch:
//!
//! ```text
//! ~/.devlab/
//! ├── repos/
//! │   ├── myapp.git/             # bare clone, marker: /home/me/src/myapp
//! │   └── myapp-1a2b3c4d.git/    # another project also named "myapp"
//! └── workspaces/
//!     ├── myapp-base/            # worktree on lab/base
//!     └── myapp-base-9f8e7d6c/   # worktree on lab/base-5d4c3b2a
//! ```
//!
//! Nothing here is cached in memory. Branch availability and bare-repo
//! identity are read from disk and git on every call, since several devlab
//! processes may be working on the same repos directory at once.

mod bare;
pub mod git;
pub mod porcelain;

use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{LabError, LabResult};
use porcelain::{WorktreeEntry, parse_worktree_list};

pub use bare::SOURCE_MARKER;

/// Directory inside each worktree that holds the rendered launch descriptor.
/// Kept out of git through the worktree's exclude file.
pub const EXCLUDED_CONFIG_DIR: &str = ".devcontainer/";

#[derive(Debug, Clone)]
pub struct WorktreeManager {
    repos_dir: PathBuf,
}

impl WorktreeManager {
    pub fn new(repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            repos_dir: repos_dir.into(),
        }
    }

    pub fn repos_dir(&self) -> &Path {
        &self.repos_dir
    }

    /// Create a worktree of `bare` at `worktree` and return the branch it
    /// checked out.
    ///
    /// If `requested_branch` is already checked out by another worktree, a
    /// random hex suffix is appended. Callers must persist the returned name.
    pub fn create_worktree(
        &self,
        bare: &Path,
        worktree: &Path,
        requested_branch: &str,
    ) -> LabResult<String> {
        if let Some(parent) = worktree.parent() {
            std::fs::create_dir_all(parent).context("Failed to create workspaces directory")?;
        }

        let mut branch = requested_branch.to_string();
        if self.branch_in_use(bare, &branch)? {
            branch = format!("{}-{}", branch, random_suffix());
            info!(requested = requested_branch, effective = %branch, "branch already checked out, using suffixed branch");
        }

        let mut cmd = git::git_in(bare);
        cmd.args(["worktree", "add"]);
        if git::branch_exists(bare, &branch) {
            debug!(%branch, "attaching worktree to existing branch");
            cmd.arg(worktree).arg(&branch);
        } else {
            debug!(%branch, "creating branch with worktree");
            cmd.arg("-b").arg(&branch).arg(worktree);
        }

        let output = git::capture(&mut cmd).map_err(|e| LabError::WorktreeCreate {
            branch: branch.clone(),
            message: format!("{:#}", e),
            output: String::new(),
        })?;
        if !output.status.success() {
            return Err(LabError::WorktreeCreate {
                branch,
                message: format!("git worktree add exited with {}", output.status),
                output: git::combined_output(&output),
            });
        }

        ensure_excluded(worktree, bare, EXCLUDED_CONFIG_DIR)?;
        info!(worktree = %worktree.display(), %branch, "created worktree");
        Ok(branch)
    }

    /// Remove a worktree, deleting its directory outright if git refuses.
    ///
    /// Fails only when both the git removal and the directory deletion fail.
    pub fn remove_worktree(&self, bare: &Path, worktree: &Path) -> LabResult<()> {
        let git_result = git::capture(
            git::git_in(bare)
                .args(["worktree", "remove", "--force"])
                .arg(worktree),
        );
        let git_error = match git_result {
            Ok(output) if output.status.success() => {
                debug!(worktree = %worktree.display(), "git worktree remove succeeded");
                return Ok(());
            }
            Ok(output) => git::combined_output(&output),
            Err(e) => format!("{:#}", e),
        };

        warn!(worktree = %worktree.display(), error = %git_error, "git worktree remove failed, deleting directory");
        match std::fs::remove_dir_all(worktree) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "remove worktree directory {}: {} (git worktree remove also failed: {})",
                    worktree.display(),
                    e,
                    git_error
                )
                .into());
            }
        }

        // The directory is gone but git still lists it until pruned.
        git::best_effort(
            git::git_in(bare).args(["worktree", "prune"]),
            "prune worktrees",
        );
        Ok(())
    }

    /// Number of entries in the worktree list, the bare repo's own included.
    ///
    /// A count of 1 or less means no lab worktrees remain.
    pub fn worktree_count(&self, bare: &Path) -> LabResult<usize> {
        Ok(self.list_worktrees(bare)?.len())
    }

    pub fn list_worktrees(&self, bare: &Path) -> LabResult<Vec<WorktreeEntry>> {
        let output = git::capture(git::git_in(bare).args(["worktree", "list", "--porcelain"]))?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "list worktrees of {}: {}",
                bare.display(),
                git::combined_output(&output)
            )
            .into());
        }
        Ok(parse_worktree_list(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn branch_in_use(&self, bare: &Path, branch: &str) -> LabResult<bool> {
        let entries = self
            .list_worktrees(bare)
            .map_err(|e| LabError::WorktreeCreate {
                branch: branch.to_string(),
                message: "inspect existing worktrees".to_string(),
                output: e.to_string(),
            })?;
        Ok(entries
            .iter()
            .any(|entry| entry.branch.as_deref() == Some(branch)))
    }
}

/// Append `pattern` to the exclude file git consults for `worktree`,
/// unless a line with that exact pattern is already present.
pub(crate) fn ensure_excluded(worktree: &Path, bare: &Path, pattern: &str) -> LabResult<()> {
    let exclude = exclude_file(worktree, bare);
    if let Some(parent) = exclude.parent() {
        std::fs::create_dir_all(parent).context("Failed to create git info directory")?;
    }

    let existing = match std::fs::read_to_string(&exclude) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to read git exclude file").into()),
    };
    if existing.lines().any(|line| line.trim() == pattern) {
        return Ok(());
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&exclude)
        .context("Failed to open git exclude file")?;
    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{}{}", separator, pattern).context("Failed to write git exclude file")?;
    debug!(path = %exclude.display(), pattern, "added exclude rule");
    Ok(())
}

/// Path of the exclude file in effect for `worktree`.
///
/// `info/` lives in the common git dir, so for a linked worktree this resolves
/// into the bare repository.
fn exclude_file(worktree: &Path, bare: &Path) -> PathBuf {
    let resolved = git::capture(git::git_in(worktree).args(["rev-parse", "--git-path", "info/exclude"]))
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|path| !path.is_empty());

    match resolved {
        Some(path) => {
            let path = PathBuf::from(path);
            if path.is_absolute() {
                path
            } else {
                worktree.join(path)
            }
        }
        None => bare.join("info").join("exclude"),
    }
}

/// Eight random hex characters.
fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{create_branch, source_repo};
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::tempdir;

    struct Setup {
        _source: tempfile::TempDir,
        _root: tempfile::TempDir,
        manager: WorktreeManager,
        bare: PathBuf,
        workspaces: PathBuf,
    }

    fn setup() -> Setup {
        let source = source_repo();
        let root = tempdir().unwrap();
        let manager = WorktreeManager::new(root.path().join("repos"));
        let bare = manager
            .ensure_bare_repo(source.path(), "testproject")
            .unwrap();
        let workspaces = root.path().join("workspaces");
        Setup {
            _source: source,
            _root: root,
            manager,
            bare,
            workspaces,
        }
    }

    fn head_branch(worktree: &Path) -> String {
        let repo = Repository::open(worktree).unwrap();
        repo.head().unwrap().shorthand().unwrap().to_string()
    }

    #[test]
    fn test_create_worktree_checks_out_new_branch() {
        let s = setup();
        let path = s.workspaces.join("test-lab");
        let branch = s
            .manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();
        assert_eq!(branch, "lab/test");
        assert!(path.join("README.md").exists());
        assert_eq!(head_branch(&path), "lab/test");
    }

    #[test]
    fn test_create_worktree_attaches_existing_branch() {
        let source = source_repo();
        create_branch(source.path(), "feature");
        let root = tempdir().unwrap();
        let manager = WorktreeManager::new(root.path().join("repos"));
        let bare = manager.ensure_bare_repo(source.path(), "proj").unwrap();

        let path = root.path().join("workspaces").join("feat");
        let branch = manager.create_worktree(&bare, &path, "feature").unwrap();
        assert_eq!(branch, "feature");
        assert_eq!(head_branch(&path), "feature");
    }

    #[test]
    fn test_create_worktree_branch_collision_gets_suffix() {
        let s = setup();
        let first = s
            .manager
            .create_worktree(&s.bare, &s.workspaces.join("lab1"), "lab/test")
            .unwrap();
        let second = s
            .manager
            .create_worktree(&s.bare, &s.workspaces.join("lab2"), "lab/test")
            .unwrap();

        assert_eq!(first, "lab/test");
        assert_ne!(first, second);
        assert!(second.starts_with("lab/test-"), "got {}", second);
        assert_eq!(second.len(), "lab/test-".len() + 8);
        assert_eq!(head_branch(&s.workspaces.join("lab2")), second);
    }

    #[test]
    fn test_create_worktree_reports_git_output() {
        let s = setup();
        let path = s.workspaces.join("occupied");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("file.txt"), "already here").unwrap();

        match s.manager.create_worktree(&s.bare, &path, "lab/occupied") {
            Err(LabError::WorktreeCreate { branch, output, .. }) => {
                assert_eq!(branch, "lab/occupied");
                assert!(!output.is_empty());
            }
            other => panic!("Expected WorktreeCreate, got {:?}", other),
        }
    }

    #[test]
    fn test_create_worktree_excludes_config_dir() {
        let s = setup();
        let path = s.workspaces.join("lab1");
        s.manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();

        fs::create_dir_all(path.join(".devcontainer")).unwrap();
        fs::write(path.join(".devcontainer/devcontainer.json"), "{}").unwrap();

        let repo = Repository::open(&path).unwrap();
        assert!(
            repo.status_should_ignore(Path::new(".devcontainer/devcontainer.json"))
                .unwrap()
        );
    }

    #[test]
    fn test_ensure_excluded_is_idempotent() {
        let s = setup();
        let path = s.workspaces.join("lab1");
        s.manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();
        ensure_excluded(&path, &s.bare, EXCLUDED_CONFIG_DIR).unwrap();
        ensure_excluded(&path, &s.bare, EXCLUDED_CONFIG_DIR).unwrap();

        let exclude = exclude_file(&path, &s.bare);
        let content = fs::read_to_string(exclude).unwrap();
        let occurrences = content
            .lines()
            .filter(|line| line.trim() == EXCLUDED_CONFIG_DIR)
            .count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_remove_worktree_deletes_directory() {
        let s = setup();
        let path = s.workspaces.join("lab1");
        s.manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();
        s.manager.remove_worktree(&s.bare, &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_worktree_falls_back_to_directory_delete() {
        let s = setup();
        let stray = s.workspaces.join("not-a-worktree");
        fs::create_dir_all(stray.join("nested")).unwrap();
        fs::write(stray.join("nested/file.txt"), "x").unwrap();

        s.manager.remove_worktree(&s.bare, &stray).unwrap();
        assert!(!stray.exists());
    }

    #[test]
    fn test_remove_missing_worktree_is_ok() {
        let s = setup();
        s.manager
            .remove_worktree(&s.bare, &s.workspaces.join("never-existed"))
            .unwrap();
    }

    #[test]
    fn test_worktree_count_tracks_lifecycle() {
        let s = setup();
        assert_eq!(s.manager.worktree_count(&s.bare).unwrap(), 1);

        let path = s.workspaces.join("lab1");
        s.manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();
        assert_eq!(s.manager.worktree_count(&s.bare).unwrap(), 2);

        s.manager.remove_worktree(&s.bare, &path).unwrap();
        assert_eq!(s.manager.worktree_count(&s.bare).unwrap(), 1);
    }

    #[test]
    fn test_worktree_count_after_manual_directory_deletion() {
        let s = setup();
        let path = s.workspaces.join("lab1");
        s.manager
            .create_worktree(&s.bare, &path, "lab/test")
            .unwrap();
        fs::remove_dir_all(&path).unwrap();

        s.manager.remove_worktree(&s.bare, &path).unwrap();
        assert_eq!(s.manager.worktree_count(&s.bare).unwrap(), 1);
    }

    #[test]
    fn test_worktree_count_on_missing_repo_is_error() {
        let root = tempdir().unwrap();
        let manager = WorktreeManager::new(root.path());
        assert!(manager.worktree_count(&root.path().join("nope.git")).is_err());
    }
}
