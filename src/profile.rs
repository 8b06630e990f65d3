//! Snapshot profiles.
//!
//! When a lab is started without an explicit profile, the user's current
//! configuration is saved as a throwaway profile named
//! `_lab-snapshot-<shortid>` and removed again when the lab is torn down.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Name prefix that marks a profile as synthesized by devlab.
pub const SNAPSHOT_PREFIX: &str = "_lab-snapshot-";

/// Creates and disposes of synthesized profiles.
pub trait SnapshotService {
    /// Capture the current configuration and return the new profile's name.
    fn snapshot(&self, short_id: &str) -> Result<String>;

    /// Delete a synthesized profile. Names without the snapshot prefix are
    /// left untouched.
    fn cleanup_snapshot(&self, name: &str) -> Result<()>;
}

pub fn is_snapshot_profile(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX)
}

pub fn snapshot_name(short_id: &str) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, short_id)
}

/// Profile store backed by a directory of `<name>.json` files and an
/// external profile tool (`claudeup` by default).
#[derive(Debug, Clone)]
pub struct ProfileManager {
    profiles_dir: PathBuf,
    profile_cmd: String,
}

impl ProfileManager {
    pub fn new(profiles_dir: impl Into<PathBuf>, profile_cmd: impl Into<String>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            profile_cmd: profile_cmd.into(),
        }
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{}.json", name))
    }

    fn write_placeholder(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.profiles_dir)
            .with_context(|| format!("Failed to create {}", self.profiles_dir.display()))?;
        std::fs::write(path, "{}").with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl SnapshotService for ProfileManager {
    fn snapshot(&self, short_id: &str) -> Result<String> {
        let name = snapshot_name(short_id);
        let path = self.profile_path(&name);

        let saved = Command::new(&self.profile_cmd)
            .args(["profile", "save", &name])
            .stdin(Stdio::null())
            .output();

        match saved {
            Ok(output) if output.status.success() => {
                if !path.exists() {
                    // The tool saved into its own directory; leave a marker
                    // here so cleanup can find the profile.
                    debug!(path = %path.display(), "profile tool wrote elsewhere, adding placeholder");
                    if let Err(e) = self.write_placeholder(&path) {
                        warn!(path = %path.display(), error = %e, "could not write snapshot placeholder");
                    }
                }
            }
            failed => {
                let reason = match failed {
                    Ok(output) => String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    Err(e) => e.to_string(),
                };
                warn!(tool = %self.profile_cmd, %reason, "profile save failed, writing empty profile");
                self.write_placeholder(&path).with_context(|| {
                    format!(
                        "Failed to write fallback profile after {} profile save failed ({})",
                        self.profile_cmd, reason
                    )
                })?;
            }
        }

        Ok(name)
    }

    fn cleanup_snapshot(&self, name: &str) -> Result<()> {
        if !is_snapshot_profile(name) {
            debug!(profile = name, "not a snapshot profile, keeping it");
            return Ok(());
        }
        let path = self.profile_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove snapshot profile {}", path.display())),
        }
    }
}
