pub mod config;
pub mod devcontainer;
pub mod docker;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod naming;
pub mod profile;
pub mod resolve;
pub mod state;
pub mod worktree;

pub use errors::{LabError, LabResult};
