//! `devlab rm`.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;

use devlab::config::LabConfig;
use devlab::devcontainer::VOLUME_PREFIX;
use devlab::manager::{LabManager, Teardown};

use super::resolve_lab;

pub fn cmd_rm(config: LabConfig, lab: Option<&str>, force: bool) -> Result<()> {
    let manager = LabManager::new(config);
    let lab = resolve_lab(&manager, lab)?;

    if !force {
        println!("This will:");
        println!("  - Stop and remove the container");
        println!("  - Remove Docker volumes ({}-*-{})", VOLUME_PREFIX, lab.id);
        println!("  - Remove worktree: {}", lab.worktree.display());
        println!("  - Remove lab metadata");
        println!();
        if !confirm("Continue?") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let outcome = manager.remove(&lab);
    println!("Removed lab: {}", lab.display_name);

    if let Teardown::BareRepoCleanupPrompt { bare_repo } = outcome {
        println!();
        println!(
            "Bare repo {} has no remaining worktrees.",
            style(bare_repo.display()).cyan()
        );
        if force || confirm("Remove bare repo?") {
            manager.remove_bare_repo(&bare_repo)?;
            println!("Removed bare repo: {}", bare_repo.display());
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}
