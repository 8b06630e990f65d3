//! CLI command implementations.
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `start`   | `Start`                   |
//! | `list`    | `List`                    |
//! | `control` | `Stop`, `Exec`, `Open`    |
//! | `rm`      | `Rm`                      |
//! | `doctor`  | `Doctor`                  |

pub mod control;
pub mod doctor;
pub mod list;
pub mod rm;
pub mod start;

pub use control::{cmd_exec, cmd_open, cmd_stop};
pub use doctor::cmd_doctor;
pub use list::cmd_list;
pub use rm::cmd_rm;
pub use start::cmd_start;

use anyhow::{Context, Result};
use devlab::manager::LabManager;
use devlab::resolve::Resolver;
use devlab::state::LabRecord;

/// Resolve `--lab`, falling back to the lab containing the current directory.
fn resolve_lab(manager: &LabManager, lab: Option<&str>) -> Result<LabRecord> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(Resolver::new(manager.store()).resolve_or_cwd(lab, &cwd)?)
}
