//! `devlab start`.

use anyhow::Result;
use console::style;

use devlab::config::LabConfig;
use devlab::manager::{LabManager, StartOptions};

pub fn cmd_start(config: LabConfig, opts: StartOptions) -> Result<()> {
    let manager = LabManager::new(config);

    println!("Starting lab for {}...", opts.project.display());
    let lab = manager.start(opts)?;

    println!();
    println!("{}", style("Lab ready!").green().bold());
    println!("  Name:     {}", lab.display_name);
    println!("  ID:       {}", lab.short_id());
    println!("  Worktree: {}", lab.worktree.display());
    println!("  Branch:   {}", lab.branch);
    println!("  Profile:  {}", lab.profile);
    println!();
    println!("Next steps:");
    println!("  devlab exec --lab {} -- <command>", lab.display_name);
    println!("  devlab open --lab {}", lab.display_name);
    println!("  devlab stop --lab {}", lab.display_name);
    Ok(())
}
