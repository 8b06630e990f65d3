//! Typed error hierarchy for devlab.
//!
//! Core operations (store, worktrees, resolver, lifecycle) return `LabError`.
//! Collaborator wrappers that shell out to docker or the devcontainer CLI use
//! `anyhow` and are wrapped into `LabError::Step` by the lifecycle manager, so
//! every failure that reaches the CLI names the operation that produced it.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::LabRecord;

#[derive(Debug, Error)]
pub enum LabError {
    /// A required tool is missing or the container engine is unreachable.
    #[error("{dependency}: {hint}")]
    Prerequisite { dependency: String, hint: String },

    #[error("{} is not a git repository", path.display())]
    NotAGitRepo { path: PathBuf },

    #[error("invalid display name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("set up bare repository for {}: {message}", source_path.display())]
    RepoSetup {
        source_path: PathBuf,
        message: String,
    },

    /// `output` is the git tool's combined stdout/stderr, kept verbatim.
    #[error("create worktree on branch {branch}: {message}\n{output}")]
    WorktreeCreate {
        branch: String,
        message: String,
        output: String,
    },

    #[error("invalid {what} {value:?}: {reason}")]
    Validation {
        what: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("ambiguous lab query {query:?}, matches: {}", describe_labs(.matches))]
    Ambiguous {
        query: String,
        matches: Vec<LabRecord>,
    },

    #[error("{}", not_found_message(.query, .available))]
    NotFound {
        query: String,
        available: Vec<LabRecord>,
    },

    #[error("{step}: {source:#}")]
    Step {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LabError {
    /// Wrap a collaborator failure with the name of the lifecycle step.
    pub fn step(step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        LabError::Step {
            step,
            source: source.into(),
        }
    }

    pub fn prerequisite(dependency: impl Into<String>, hint: impl Into<String>) -> Self {
        LabError::Prerequisite {
            dependency: dependency.into(),
            hint: hint.into(),
        }
    }
}

pub type LabResult<T> = std::result::Result<T, LabError>;

fn describe_labs(labs: &[LabRecord]) -> String {
    labs.iter()
        .map(|lab| format!("{} ({})", lab.display_name, lab.short_id()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn not_found_message(query: &str, available: &[LabRecord]) -> String {
    if available.is_empty() {
        format!("no lab matched {:?} (no labs found)", query)
    } else {
        format!(
            "no lab matched {:?}, available: {}",
            query,
            describe_labs(available)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LabRecord;

    fn record(id: &str, name: &str) -> LabRecord {
        LabRecord::builder(id, name).build()
    }

    #[test]
    fn ambiguous_lists_names_and_short_ids() {
        let err = LabError::Ambiguous {
            query: "shared".into(),
            matches: vec![
                record("aaaaaaaa-1111", "shared-one"),
                record("bbbbbbbb-2222", "shared-two"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("shared-one (aaaaaaaa)"));
        assert!(msg.contains("shared-two (bbbbbbbb)"));
    }

    #[test]
    fn not_found_with_no_labs_says_so() {
        let err = LabError::NotFound {
            query: "ghost".into(),
            available: Vec::new(),
        };
        assert_eq!(err.to_string(), "no lab matched \"ghost\" (no labs found)");
    }

    #[test]
    fn not_found_lists_available() {
        let err = LabError::NotFound {
            query: "ghost".into(),
            available: vec![record("12345678-abcd", "myapp-base")],
        };
        assert!(err.to_string().contains("available: myapp-base (12345678)"));
    }

    #[test]
    fn step_wraps_cause_with_operation_name() {
        let err = LabError::step("devcontainer up", anyhow::anyhow!("exit status 1"));
        assert_eq!(err.to_string(), "devcontainer up: exit status 1");
        match &err {
            LabError::Step { step, .. } => assert_eq!(*step, "devcontainer up"),
            _ => panic!("Expected Step"),
        }
    }

    #[test]
    fn worktree_create_keeps_tool_output_verbatim() {
        let err = LabError::WorktreeCreate {
            branch: "lab/base".into(),
            message: "git worktree add exited with 128".into(),
            output: "fatal: 'lab/base' is already checked out".into(),
        };
        assert!(
            err.to_string()
                .ends_with("fatal: 'lab/base' is already checked out")
        );
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&LabError::prerequisite("git", "not found on PATH"));
        assert_std_error(&LabError::NotAGitRepo {
            path: PathBuf::from("/tmp/x"),
        });
    }
}
