//! `devlab doctor`: report whether the host can run labs.

use anyhow::{Result, bail};
use console::style;

use devlab::config::LabConfig;
use devlab::manager::{LabManager, LabStatus, install_hint};

fn ok(msg: impl std::fmt::Display) {
    println!("{} {}", style("[OK]").green(), msg);
}

fn warn(msg: impl std::fmt::Display) {
    println!("{} {}", style("[WARN]").yellow(), msg);
}

fn fail(msg: impl std::fmt::Display) {
    println!("{} {}", style("[FAIL]").red(), msg);
}

pub fn cmd_doctor(config: LabConfig) -> Result<()> {
    let manager = LabManager::new(config);
    let config = manager.config();
    let mut issues = 0;

    if manager.engine().is_running() {
        ok("Docker is running");
    } else {
        fail("Docker is not running");
        issues += 1;
    }

    for tool in &config.required_tools {
        match which::which(tool) {
            Ok(path) => ok(format!("{} found: {}", tool, path.display())),
            Err(_) => {
                fail(format!("{} {}", tool, install_hint(tool)));
                issues += 1;
            }
        }
    }

    if which::which(&config.profile_cmd).is_ok() {
        ok(format!("{} found", config.profile_cmd));
    } else {
        warn(format!(
            "{} not found (needed for profile snapshots)",
            config.profile_cmd
        ));
    }

    if manager.images().exists_locally(&config.image) {
        ok(format!("Base image available: {}", config.image));
    } else {
        warn(format!(
            "Base image not found locally: {} (will be pulled on first start)",
            config.image
        ));
    }

    let labs = manager.store().list()?;
    let orphaned: Vec<_> = labs
        .iter()
        .filter(|lab| manager.status(lab) == LabStatus::Orphaned)
        .collect();
    for lab in &orphaned {
        warn(format!(
            "Orphaned lab: {} ({}), worktree missing",
            lab.display_name,
            lab.short_id()
        ));
    }
    if labs.is_empty() {
        ok("No labs found");
    } else if orphaned.is_empty() {
        ok(format!("{} lab(s) found, no orphans", labs.len()));
    }

    println!();
    if issues > 0 {
        println!("{} issue(s) found.", issues);
        bail!("doctor found {} issue(s)", issues);
    }
    println!("All checks passed.");
    Ok(())
}
