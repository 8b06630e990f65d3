//! `devlab list`.

use anyhow::Result;
use console::style;

use devlab::config::LabConfig;
use devlab::manager::{LabManager, LabStatus};

pub fn cmd_list(config: LabConfig) -> Result<()> {
    let manager = LabManager::new(config);
    let labs = manager.store().list()?;

    if labs.is_empty() {
        println!("No labs found.");
        return Ok(());
    }

    println!(
        "{:<30} {:<10} {:<20} {:<15} STATUS",
        "NAME", "ID", "PROJECT", "PROFILE"
    );
    println!(
        "{:<30} {:<10} {:<20} {:<15} ------",
        "----", "--", "-------", "-------"
    );

    for lab in &labs {
        let status = manager.status(lab);
        let status = match status {
            LabStatus::Running => style(status.as_str()).green(),
            LabStatus::Stopped => style(status.as_str()).dim(),
            LabStatus::Orphaned => style(status.as_str()).yellow(),
        };
        println!(
            "{:<30} {:<10} {:<20} {:<15} {}",
            lab.display_name,
            lab.short_id(),
            lab.project_name,
            lab.profile,
            status
        );
    }
    Ok(())
}
