use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::LabManager;
use crate::devcontainer::{DevcontainerConfig, FeatureSpec};
use crate::errors::{LabError, LabResult};
use crate::naming::{compute_display_name, disambiguate_display_name, validate_display_name};
use crate::state::{LabRecord, short_id};
use crate::worktree::git::is_git_repository;

/// Parameters for [`LabManager::start`].
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub project: PathBuf,
    /// Profile to apply; a snapshot of the current configuration when `None`.
    pub profile: Option<String>,
    /// Branch to check out; `lab/<profile>` when `None`.
    pub branch: Option<String>,
    /// Display name; `<project>-<profile>` when `None`.
    pub name: Option<String>,
    pub features: Vec<FeatureSpec>,
    pub base_profile: Option<String>,
}

impl StartOptions {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }
}

impl LabManager {
    /// Provision a lab and launch its container.
    ///
    /// The record is saved only after the container is up, so the store
    /// never lists a lab whose launch failed. A worktree created before a
    /// failed render or launch is removed again.
    pub fn start(&self, opts: StartOptions) -> LabResult<LabRecord> {
        self.check_prerequisites()?;

        let project = canonical_project(&opts.project)?;
        if !is_git_repository(&project) {
            return Err(LabError::NotAGitRepo { path: project });
        }
        let project_name = project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| LabError::NotAGitRepo {
                path: project.clone(),
            })?;

        let (profile, snapshot) = match opts.profile.as_deref().filter(|p| !p.is_empty()) {
            Some(profile) => (profile.to_string(), None),
            None => {
                let tag = Uuid::new_v4().simple().to_string();
                let name = self
                    .collab
                    .snapshots
                    .snapshot(&tag[..8])
                    .map_err(|e| LabError::step("snapshot current config", e))?;
                info!(profile = %name, "snapshotted current configuration");
                (name.clone(), Some(name))
            }
        };

        let result = self.provision(&opts, &project, &project_name, &profile, snapshot.as_deref());
        if result.is_err()
            && let Some(name) = &snapshot
            && let Err(e) = self.collab.snapshots.cleanup_snapshot(name)
        {
            warn!(profile = %name, error = %e, "could not discard snapshot after failed start");
        }
        result
    }

    fn provision(
        &self,
        opts: &StartOptions,
        project: &Path,
        project_name: &str,
        profile: &str,
        snapshot: Option<&str>,
    ) -> LabResult<LabRecord> {
        let id = Uuid::new_v4().to_string();

        self.collab
            .images
            .ensure_image(&self.config.image)
            .map_err(|e| LabError::step("ensure base image", e))?;

        let bare_repo = self.worktrees.ensure_bare_repo(project, project_name)?;

        let display_name = compute_display_name(project_name, profile, opts.name.as_deref());
        validate_display_name(&display_name)?;
        let existing: HashSet<String> = self
            .store
            .list()?
            .into_iter()
            .map(|lab| lab.display_name)
            .collect();
        let display_name = disambiguate_display_name(&display_name, short_id(&id), &existing);

        let requested_branch = opts
            .branch
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| format!("lab/{}", profile));
        let worktree = self.workspace_path(&display_name);
        let branch = self
            .worktrees
            .create_worktree(&bare_repo, &worktree, &requested_branch)?;

        let descriptor = DevcontainerConfig {
            lab_id: id.clone(),
            display_name: display_name.clone(),
            project_name: project_name.to_string(),
            profile: profile.to_string(),
            image: self.config.image.clone(),
            bare_repo: bare_repo.clone(),
            home_dir: self.config.home_dir.clone(),
            profile_home: self.config.profile_home.clone(),
            git_user_name: self.config.git_user_name.clone(),
            git_user_email: self.config.git_user_email.clone(),
            config_repo: self.config.config_repo.clone(),
            config_branch: self.config.config_branch.clone(),
            base_profile: opts.base_profile.clone(),
            container_env: self.config.container_env.clone(),
            features: opts.features.clone(),
        };
        if let Err(e) = self.collab.renderer.render(&descriptor, &worktree) {
            self.rollback_worktree(&bare_repo, &worktree);
            return Err(LabError::step("render devcontainer", e));
        }

        info!(lab = %display_name, worktree = %worktree.display(), "starting devcontainer");
        if let Err(e) = self.collab.launcher.up(&worktree) {
            self.rollback_worktree(&bare_repo, &worktree);
            return Err(LabError::step("devcontainer up", e));
        }

        let record = LabRecord {
            id,
            display_name,
            project: project.to_path_buf(),
            project_name: project_name.to_string(),
            profile: profile.to_string(),
            bare_repo,
            worktree,
            branch,
            created: Utc::now(),
            snapshot: snapshot.map(str::to_string),
        };
        self.store.save(&record)?;
        Ok(record)
    }

    fn rollback_worktree(&self, bare_repo: &Path, worktree: &Path) {
        if let Err(e) = self.worktrees.remove_worktree(bare_repo, worktree) {
            warn!(worktree = %worktree.display(), error = %e, "rollback could not remove worktree");
        }
    }
}

/// The single spelling of a project path used as its bare-repo identity.
///
/// Trailing slashes, `.`/`..` components and symlinks all resolve to the
/// same path, so one project never maps to two bare clones.
fn canonical_project(project: &Path) -> LabResult<PathBuf> {
    std::fs::canonicalize(project).map_err(|_| LabError::NotAGitRepo {
        path: std::path::absolute(project).unwrap_or_else(|_| project.to_path_buf()),
    })
}
