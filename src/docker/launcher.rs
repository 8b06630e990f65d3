//! The devcontainer CLI, which turns a rendered workspace into a container.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

pub trait WorkspaceLauncher {
    /// Build and start the container for the workspace at `worktree`.
    fn up(&self, worktree: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DevcontainerCli {
    binary: String,
}

impl Default for DevcontainerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DevcontainerCli {
    pub fn new() -> Self {
        Self::with_binary("devcontainer")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, subcommand: &str, worktree: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(subcommand).arg("--workspace-folder").arg(worktree);
        cmd
    }

    /// Run `argv` inside the workspace container with the terminal attached.
    /// An empty `argv` opens an interactive `bash`.
    pub fn exec(&self, worktree: &Path, argv: &[String]) -> Result<ExitStatus> {
        let mut cmd = self.command("exec", worktree);
        if argv.is_empty() {
            cmd.arg("bash");
        } else {
            cmd.args(argv);
        }
        debug!(command = ?cmd, "exec in lab");
        cmd.status()
            .with_context(|| format!("Failed to run {} exec", self.binary))
    }

    /// Hostname of the running container, which docker sets to the short
    /// container id.
    pub fn hostname(&self, worktree: &Path) -> Result<String> {
        let output = self
            .command("exec", worktree)
            .arg("hostname")
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to run {} exec", self.binary))?;
        if !output.status.success() {
            bail!("get container hostname: exited with {}", output.status);
        }
        let hostname = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hostname.is_empty() {
            bail!("get container hostname: empty output");
        }
        Ok(hostname)
    }
}

impl WorkspaceLauncher for DevcontainerCli {
    fn up(&self, worktree: &Path) -> Result<()> {
        let mut cmd = self.command("up", worktree);
        debug!(command = ?cmd, "starting devcontainer");
        let status = cmd
            .status()
            .with_context(|| format!("Failed to run {} up", self.binary))?;
        if !status.success() {
            bail!("{} up exited with {}", self.binary, status);
        }
        Ok(())
    }
}
