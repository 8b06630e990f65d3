//! Persisted lab records.
//!
//! One JSON file per lab, named `<id>.json`, under the store directory:
//!
//! ```text
//! ~/.devlab/state/
//! ├── 3f2c9a1e-....json
//! └── 9b41d07c-....json
//! ```
//!
//! Records are write-once: the lifecycle manager saves a record after a
//! successful launch and deletes it on teardown. Nothing rewrites one in place.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{LabError, LabResult};

/// Metadata for a single lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabRecord {
    /// Random v4 UUID, immutable for the life of the lab.
    pub id: String,
    pub display_name: String,
    /// Absolute path of the source project.
    pub project: PathBuf,
    /// Basename of `project`.
    pub project_name: String,
    pub profile: String,
    pub bare_repo: PathBuf,
    pub worktree: PathBuf,
    /// The branch actually checked out, which may carry a collision suffix.
    pub branch: String,
    pub created: DateTime<Utc>,
    /// Set when `profile` was synthesized from the user's current config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl LabRecord {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First eight characters of an identifier.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Directory-backed store of `LabRecord`s.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, record: &LabRecord) -> LabResult<()> {
        validate_id(&record.id)?;
        std::fs::create_dir_all(&self.dir).context("Failed to create state directory")?;

        let data = serde_json::to_string_pretty(record).context("Failed to serialize lab metadata")?;
        let path = self.record_path(&record.id);
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write metadata to {}", path.display()))?;

        debug!(id = %record.id, path = %path.display(), "saved lab record");
        Ok(())
    }

    pub fn load(&self, id: &str) -> LabResult<LabRecord> {
        validate_id(id)?;
        let path = self.record_path(id);
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read metadata for {}", id))?;
        let record = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse metadata for {}", id))?;
        Ok(record)
    }

    /// All readable records, oldest first.
    ///
    /// A missing store directory is the first-run case and yields an empty
    /// list. Files that fail to load are skipped so one corrupt record cannot
    /// make every other lab unreachable.
    pub fn list(&self) -> LabResult<Vec<LabRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern).context("Failed to build state directory glob")?;

        let mut records = Vec::new();
        for path in entries.filter_map(|entry| entry.ok()) {
            if !path.is_file() {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(id) {
                Ok(record) => records.push(record),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable lab record"),
            }
        }

        records.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn delete(&self, id: &str) -> LabResult<()> {
        validate_id(id)?;
        let path = self.record_path(id);
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete metadata for {}", id))?;
        debug!(id, "deleted lab record");
        Ok(())
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// Reject identifiers that could escape the store directory.
fn validate_id(id: &str) -> LabResult<()> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.contains('/') || id.contains('\\') || id.contains(std::path::MAIN_SEPARATOR) {
        Some("must not contain path separators")
    } else if id.contains("..") {
        Some("must not contain '..'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(LabError::Validation {
            what: "lab ID",
            value: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) struct LabRecordBuilder {
    record: LabRecord,
}

#[cfg(test)]
impl LabRecord {
    pub(crate) fn builder(id: &str, display_name: &str) -> LabRecordBuilder {
        LabRecordBuilder {
            record: LabRecord {
                id: id.to_string(),
                display_name: display_name.to_string(),
                project: PathBuf::from("/src/myapp"),
                project_name: "myapp".to_string(),
                profile: "base".to_string(),
                bare_repo: PathBuf::from("/labs/repos/myapp.git"),
                worktree: PathBuf::from("/labs/workspaces").join(display_name),
                branch: "lab/base".to_string(),
                created: Utc::now(),
                snapshot: None,
            },
        }
    }
}

#[cfg(test)]
impl LabRecordBuilder {
    pub(crate) fn project_name(mut self, name: &str) -> Self {
        self.record.project_name = name.to_string();
        self.record.project = PathBuf::from("/src").join(name);
        self
    }

    pub(crate) fn profile(mut self, profile: &str) -> Self {
        self.record.profile = profile.to_string();
        self
    }

    pub(crate) fn worktree(mut self, path: impl Into<PathBuf>) -> Self {
        self.record.worktree = path.into();
        self
    }

    pub(crate) fn bare_repo(mut self, path: impl Into<PathBuf>) -> Self {
        self.record.bare_repo = path.into();
        self
    }

    pub(crate) fn snapshot(mut self, name: &str) -> Self {
        self.record.profile = name.to_string();
        self.record.snapshot = Some(name.to_string());
        self
    }

    pub(crate) fn build(self) -> LabRecord {
        self.record
    }
}
