//! Lab lifecycle: provisioning, status, stop and teardown.
//!
//! `LabManager` owns the on-disk stores and talks to the outside world only
//! through the collaborator traits, so the whole lifecycle can run against
//! fakes in tests.

mod provision;
mod teardown;

use std::path::Path;
use tracing::debug;

use crate::config::LabConfig;
use crate::errors::{LabError, LabResult};
use crate::state::{LabRecord, StateStore};
use crate::worktree::WorktreeManager;

pub use crate::devcontainer::{DescriptorRenderer, FileRenderer};
pub use crate::docker::{
    ContainerEngine, DevcontainerCli, DockerCli, ImageManager, ImageProvider, WorkspaceLauncher,
};
pub use crate::profile::{ProfileManager, SnapshotService};
pub use provision::StartOptions;
pub use teardown::Teardown;

/// The external systems a lab depends on.
pub struct Collaborators {
    pub engine: Box<dyn ContainerEngine>,
    pub images: Box<dyn ImageProvider>,
    pub snapshots: Box<dyn SnapshotService>,
    pub renderer: Box<dyn DescriptorRenderer>,
    pub launcher: Box<dyn WorkspaceLauncher>,
}

impl Collaborators {
    /// docker, the devcontainer CLI and the profile tool on the host.
    pub fn system(config: &LabConfig) -> Self {
        let docker = DockerCli::new();
        Self {
            engine: Box::new(docker.clone()),
            images: Box::new(ImageManager::new(docker)),
            snapshots: Box::new(ProfileManager::new(
                config.profiles_dir(),
                config.profile_cmd.clone(),
            )),
            renderer: Box::new(FileRenderer),
            launcher: Box::new(DevcontainerCli::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabStatus {
    /// A running container carries the worktree's label.
    Running,
    /// No running container, but the worktree is still on disk.
    Stopped,
    /// The record outlived its worktree.
    Orphaned,
}

impl LabStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LabStatus::Running => "running",
            LabStatus::Stopped => "stopped",
            LabStatus::Orphaned => "orphaned",
        }
    }
}

impl std::fmt::Display for LabStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct LabManager {
    config: LabConfig,
    store: StateStore,
    worktrees: WorktreeManager,
    collab: Collaborators,
}

impl LabManager {
    pub fn new(config: LabConfig) -> Self {
        let collab = Collaborators::system(&config);
        Self::with_collaborators(config, collab)
    }

    pub fn with_collaborators(config: LabConfig, collab: Collaborators) -> Self {
        Self {
            store: StateStore::new(config.state_dir()),
            worktrees: WorktreeManager::new(config.repos_dir()),
            config,
            collab,
        }
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn worktrees(&self) -> &WorktreeManager {
        &self.worktrees
    }

    pub fn engine(&self) -> &dyn ContainerEngine {
        self.collab.engine.as_ref()
    }

    pub fn images(&self) -> &dyn ImageProvider {
        self.collab.images.as_ref()
    }

    pub fn status(&self, lab: &LabRecord) -> LabStatus {
        match self.collab.engine.find_container(&lab.worktree, false) {
            Ok(Some(_)) => return LabStatus::Running,
            Ok(None) => {}
            Err(e) => debug!(lab = %lab.display_name, error = %e, "container lookup failed"),
        }
        if lab.worktree.exists() {
            LabStatus::Stopped
        } else {
            LabStatus::Orphaned
        }
    }

    /// Stop the lab's running container. Returns `false` if none was running.
    pub fn stop(&self, lab: &LabRecord) -> LabResult<bool> {
        let Some(id) = self
            .collab
            .engine
            .find_container(&lab.worktree, false)
            .map_err(|e| LabError::step("find container", e))?
        else {
            return Ok(false);
        };
        self.collab
            .engine
            .stop_container(&id)
            .map_err(|e| LabError::step("stop container", e))?;
        Ok(true)
    }

    /// Verify every required tool is on PATH and the engine answers.
    pub fn check_prerequisites(&self) -> LabResult<()> {
        for tool in &self.config.required_tools {
            if which::which(tool).is_err() {
                return Err(LabError::prerequisite(tool.as_str(), install_hint(tool)));
            }
        }
        if !self.collab.engine.is_running() {
            return Err(LabError::prerequisite(
                "container engine",
                "Docker is not running (start Docker Desktop or the docker daemon)",
            ));
        }
        Ok(())
    }

    pub(crate) fn workspace_path(&self, display_name: &str) -> std::path::PathBuf {
        self.config.workspaces_dir().join(display_name)
    }

    pub(crate) fn is_inside_repos(&self, path: &Path) -> bool {
        let repos = self.config.repos_dir();
        path != repos
            && path.starts_with(&repos)
            && !path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
    }
}

pub fn install_hint(tool: &str) -> &'static str {
    match tool {
        "devcontainer" => "not found on PATH (install: npm install -g @devcontainers/cli)",
        "docker" => "not found on PATH (install Docker Desktop or docker engine)",
        "git" => "not found on PATH",
        _ => "not found on PATH",
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use anyhow::{Result, bail};
    use std::sync::{Arc, Mutex};

    use crate::devcontainer::DevcontainerConfig;
    use crate::profile::snapshot_name;

    /// Ordered record of collaborator calls, shared by all fakes.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub(crate) fn called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }

        pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
            self.calls().iter().position(|c| c.starts_with(prefix))
        }
    }

    /// Knobs for the fake collaborators.
    #[derive(Debug, Clone)]
    pub(crate) struct Fakes {
        pub(crate) engine_running: bool,
        pub(crate) container: Option<String>,
        pub(crate) volumes: Vec<String>,
        pub(crate) fail_container_removal: bool,
        pub(crate) fail_image: bool,
        pub(crate) fail_render: bool,
        pub(crate) fail_up: bool,
    }

    impl Default for Fakes {
        fn default() -> Self {
            Self {
                engine_running: true,
                container: None,
                volumes: Vec::new(),
                fail_container_removal: false,
                fail_image: false,
                fail_render: false,
                fail_up: false,
            }
        }
    }

    impl Fakes {
        pub(crate) fn into_collaborators(self, log: &CallLog) -> Collaborators {
            Collaborators {
                engine: Box::new(FakeEngine {
                    fakes: self.clone(),
                    log: log.clone(),
                }),
                images: Box::new(FakeImages {
                    fail: self.fail_image,
                    log: log.clone(),
                }),
                snapshots: Box::new(FakeSnapshots { log: log.clone() }),
                renderer: Box::new(FakeRenderer {
                    fail: self.fail_render,
                    log: log.clone(),
                }),
                launcher: Box::new(FakeLauncher {
                    fail: self.fail_up,
                    log: log.clone(),
                }),
            }
        }
    }

    struct FakeEngine {
        fakes: Fakes,
        log: CallLog,
    }

    impl ContainerEngine for FakeEngine {
        fn is_running(&self) -> bool {
            self.log.push("engine.is_running");
            self.fakes.engine_running
        }

        fn find_container(&self, _worktree: &Path, _include_stopped: bool) -> Result<Option<String>> {
            Ok(self.fakes.container.clone())
        }

        fn stop_container(&self, id: &str) -> Result<()> {
            self.log.push(format!("engine.stop {}", id));
            Ok(())
        }

        fn remove_container(&self, id: &str) -> Result<()> {
            self.log.push(format!("engine.remove {}", id));
            if self.fakes.fail_container_removal {
                bail!("container {} is stuck", id);
            }
            Ok(())
        }

        fn list_volumes(&self, pattern: &str) -> Result<Vec<String>> {
            Ok(self
                .fakes
                .volumes
                .iter()
                .filter(|v| v.contains(pattern))
                .cloned()
                .collect())
        }

        fn remove_volumes(&self, names: &[String]) -> Result<()> {
            self.log.push(format!("engine.remove_volumes {}", names.join(",")));
            Ok(())
        }
    }

    struct FakeImages {
        fail: bool,
        log: CallLog,
    }

    impl ImageProvider for FakeImages {
        fn ensure_image(&self, tag: &str) -> Result<()> {
            self.log.push(format!("images.ensure {}", tag));
            if self.fail {
                bail!("registry unreachable");
            }
            Ok(())
        }

        fn exists_locally(&self, _tag: &str) -> bool {
            !self.fail
        }
    }

    struct FakeSnapshots {
        log: CallLog,
    }

    impl SnapshotService for FakeSnapshots {
        fn snapshot(&self, short_id: &str) -> Result<String> {
            let name = snapshot_name(short_id);
            self.log.push(format!("snapshots.snapshot {}", name));
            Ok(name)
        }

        fn cleanup_snapshot(&self, name: &str) -> Result<()> {
            self.log.push(format!("snapshots.cleanup {}", name));
            Ok(())
        }
    }

    struct FakeRenderer {
        fail: bool,
        log: CallLog,
    }

    impl DescriptorRenderer for FakeRenderer {
        fn render(&self, config: &DevcontainerConfig, worktree: &Path) -> Result<()> {
            self.log.push(format!("renderer.render {}", config.display_name));
            if self.fail {
                bail!("disk full");
            }
            FileRenderer.render(config, worktree)
        }
    }

    struct FakeLauncher {
        fail: bool,
        log: CallLog,
    }

    impl WorkspaceLauncher for FakeLauncher {
        fn up(&self, worktree: &Path) -> Result<()> {
            self.log.push(format!("launcher.up {}", worktree.display()));
            if self.fail {
                bail!("devcontainer up exited with exit status: 1");
            }
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::Fakes;
    use super::harness::Harness;
    use super::*;

    #[test]
    fn test_status_running_when_container_found() {
        let h = Harness::with(Fakes {
            container: Some("c0ffee".into()),
            ..Fakes::default()
        });
        let lab = h.manager.start(h.options()).unwrap();
        assert_eq!(h.manager.status(&lab), LabStatus::Running);
    }

    #[test]
    fn test_status_stopped_and_orphaned() {
        let h = Harness::new();
        let lab = h.manager.start(h.options()).unwrap();
        assert_eq!(h.manager.status(&lab), LabStatus::Stopped);

        std::fs::remove_dir_all(&lab.worktree).unwrap();
        assert_eq!(h.manager.status(&lab), LabStatus::Orphaned);
    }

    #[test]
    fn test_stop_without_container() {
        let h = Harness::new();
        let lab = h.manager.start(h.options()).unwrap();
        assert!(!h.manager.stop(&lab).unwrap());
        assert!(!h.log.called("engine.stop"));
    }

    #[test]
    fn test_stop_running_container() {
        let h = Harness::with(Fakes {
            container: Some("c0ffee".into()),
            ..Fakes::default()
        });
        let lab = h.manager.start(h.options()).unwrap();
        assert!(h.manager.stop(&lab).unwrap());
        assert!(h.log.called("engine.stop c0ffee"));
    }

    #[test]
    fn test_prerequisite_missing_tool() {
        let mut h = Harness::new();
        h.manager.config.required_tools = vec!["devlab-test-no-such-tool".to_string()];
        match h.manager.check_prerequisites() {
            Err(LabError::Prerequisite { dependency, .. }) => {
                assert_eq!(dependency, "devlab-test-no-such-tool")
            }
            other => panic!("Expected Prerequisite, got {:?}", other),
        }
    }

    #[test]
    fn test_prerequisite_engine_down() {
        let h = Harness::with(Fakes {
            engine_running: false,
            ..Fakes::default()
        });
        let err = h.manager.check_prerequisites().unwrap_err();
        assert!(err.to_string().contains("Docker is not running"));
    }

    #[test]
    fn test_is_inside_repos() {
        let h = Harness::new();
        let repos = h.manager.config().repos_dir();
        assert!(h.manager.is_inside_repos(&repos.join("myapp.git")));
        assert!(!h.manager.is_inside_repos(&repos));
        assert!(!h.manager.is_inside_repos(&repos.join("..").join("state")));
        assert!(!h.manager.is_inside_repos(Path::new("/etc")));
    }
}
