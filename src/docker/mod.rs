//! Container engine access through the `docker` CLI.
//!
//! Containers started by the devcontainer CLI carry a
//! `devcontainer.local_folder=<worktree>` label; that label is the only link
//! between a lab and its container.

pub mod image;
pub mod launcher;

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

pub use image::{ImageManager, ImageProvider};
pub use launcher::{DevcontainerCli, WorkspaceLauncher};

pub const LOCAL_FOLDER_LABEL: &str = "devcontainer.local_folder";

/// Operations the lifecycle manager needs from the container engine.
pub trait ContainerEngine {
    /// Whether the engine daemon answers.
    fn is_running(&self) -> bool;

    /// Id of the container labelled with `worktree`, if any. Stopped
    /// containers are considered only when `include_stopped` is set.
    fn find_container(&self, worktree: &Path, include_stopped: bool) -> Result<Option<String>>;

    fn stop_container(&self, id: &str) -> Result<()>;

    /// Force-remove a container, running or not.
    fn remove_container(&self, id: &str) -> Result<()>;

    /// Names of volumes containing `pattern`.
    fn list_volumes(&self, pattern: &str) -> Result<Vec<String>>;

    fn remove_volumes(&self, names: &[String]) -> Result<()>;
}

/// [`ContainerEngine`] backed by the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run `docker <args>` and return stdout, failing on a non-zero exit.
    pub(crate) fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            bail!(
                "{} {} failed: {}",
                self.binary,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(binary = %self.binary, ?args, "running container engine");
        self.command()
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {}", self.binary))
    }
}

impl ContainerEngine for DockerCli {
    fn is_running(&self) -> bool {
        self.command()
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn find_container(&self, worktree: &Path, include_stopped: bool) -> Result<Option<String>> {
        let filter = format!("label={}={}", LOCAL_FOLDER_LABEL, worktree.display());
        let flags = if include_stopped { "-aq" } else { "-q" };
        let stdout = self.run(&["ps", flags, "--filter", &filter])?;
        Ok(first_id(&stdout))
    }

    fn stop_container(&self, id: &str) -> Result<()> {
        self.run(&["stop", id]).map(|_| ())
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        self.run(&["rm", "-f", id]).map(|_| ())
    }

    fn list_volumes(&self, pattern: &str) -> Result<Vec<String>> {
        let stdout = self.run(&["volume", "ls", "--format", "{{.Name}}"])?;
        Ok(matching_volumes(&stdout, pattern))
    }

    fn remove_volumes(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["volume", "rm"];
        args.extend(names.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }
}

fn first_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn matching_volumes(stdout: &str, pattern: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && name.contains(pattern))
        .map(str::to_string)
        .collect()
}
