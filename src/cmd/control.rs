//! Commands that act on an existing lab's container: stop, exec, open.

use anyhow::{Context, Result, bail};

use devlab::config::LabConfig;
use devlab::manager::{DevcontainerCli, LabManager};

use super::resolve_lab;

pub fn cmd_stop(config: LabConfig, lab: Option<&str>) -> Result<()> {
    let manager = LabManager::new(config);
    let lab = resolve_lab(&manager, lab)?;

    println!("Stopping lab: {}...", lab.display_name);
    if manager.stop(&lab)? {
        println!("Stopped lab: {}", lab.display_name);
    } else {
        println!("No running container found for lab: {}", lab.display_name);
    }
    Ok(())
}

pub fn cmd_exec(config: LabConfig, lab: Option<&str>, command: &[String]) -> Result<()> {
    let manager = LabManager::new(config);
    let lab = resolve_lab(&manager, lab)?;

    let status = DevcontainerCli::new().exec(&lab.worktree, command)?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}

pub fn cmd_open(config: LabConfig, lab: Option<&str>) -> Result<()> {
    if which::which("code").is_err() {
        bail!("VS Code CLI 'code' not found on PATH");
    }

    let manager = LabManager::new(config);
    let lab = resolve_lab(&manager, lab)?;

    let hostname = DevcontainerCli::new()
        .hostname(&lab.worktree)
        .context("Could not get container id, is the lab running?")?;
    let uri = attached_container_uri(&hostname, &lab.display_name);

    let status = std::process::Command::new("code")
        .arg("--folder-uri")
        .arg(&uri)
        .status()
        .context("Failed to run code")?;
    if !status.success() {
        bail!("code exited with {}", status);
    }

    println!("VS Code attached to lab: {} ({})", lab.display_name, lab.short_id());
    Ok(())
}

/// VS Code URI for attaching to a container by hostname.
fn attached_container_uri(hostname: &str, display_name: &str) -> String {
    format!(
        "vscode-remote://attached-container+{}/workspaces/{}",
        hex::encode(hostname),
        display_name
    )
}
