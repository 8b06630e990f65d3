//! Thin wrappers over the `git` binary and libgit2.
//!
//! Mutating operations (clone, fetch, worktree add/remove) go through the
//! `git` binary so that concurrent invocations of devlab serialize on git's
//! own lock files. Read-only lookups use `git2`.

use anyhow::{Context, Result};
use git2::{BranchType, Repository};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::{debug, warn};

/// A `git` command with `-C <dir>` already applied.
pub(crate) fn git_in(dir: &Path) -> Command {
    let mut cmd = git();
    cmd.arg("-C").arg(dir);
    cmd
}

/// A bare `git` command that never prompts for credentials.
pub(crate) fn git() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0").stdin(Stdio::null());
    cmd
}

/// Run to completion, capturing stdout and stderr.
pub(crate) fn capture(cmd: &mut Command) -> Result<Output> {
    debug!(command = ?cmd, "running git");
    cmd.output().context("Failed to run git")
}

/// Combined stdout and stderr of a finished command.
pub(crate) fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}

/// Run a command whose failure must not block the caller. Failures are logged.
pub(crate) fn best_effort(cmd: &mut Command, what: &str) -> bool {
    match capture(cmd) {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            warn!(
                operation = what,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git step failed, continuing"
            );
            false
        }
        Err(e) => {
            warn!(operation = what, error = %e, "git step failed, continuing");
            false
        }
    }
}

/// Clone `source` (a URL or local path) as a bare repository at `dest`.
pub(crate) fn clone_bare(source: impl AsRef<OsStr>, dest: &Path) -> Result<Output> {
    capture(git().arg("clone").arg("--bare").arg(source).arg(dest))
}

/// Copy every local branch of `source` into `bare`, forcing updates.
pub(crate) fn fetch_local_branches(bare: &Path, source: &Path) -> bool {
    best_effort(
        git_in(bare)
            .arg("fetch")
            .arg(source)
            .arg("+refs/heads/*:refs/heads/*"),
        "fetch local branches",
    )
}

pub fn is_git_repository(path: &Path) -> bool {
    Repository::open(path).is_ok()
}

/// URL of the `origin` remote, if configured.
pub(crate) fn origin_url(source: &Path) -> Option<String> {
    let repo = Repository::open(source).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote
        .url()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

pub(crate) fn branch_exists(repo_path: &Path, branch: &str) -> bool {
    Repository::open(repo_path)
        .and_then(|repo| repo.find_branch(branch, BranchType::Local).map(|_| ()))
        .is_ok()
}

/// A value from the user's global git configuration, if set.
pub fn global_config_value(key: &str) -> Option<String> {
    let config = git2::Config::open_default().ok()?;
    config
        .get_string(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
