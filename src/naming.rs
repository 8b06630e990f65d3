//! Display names for labs.
//!
//! A display name is the user-facing handle for a lab and doubles as the
//! worktree directory name, so it must be a single safe path component.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::errors::{LabError, LabResult};

static VALID_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("display name pattern is valid")
});

/// The user's explicit name, or `<project>-<profile>`.
pub fn compute_display_name(project_name: &str, profile: &str, user_name: Option<&str>) -> String {
    match user_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}-{}", project_name, profile),
    }
}

pub fn validate_display_name(name: &str) -> LabResult<()> {
    let invalid = |reason: &str| LabError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if !VALID_NAME.is_match(name) {
        return Err(invalid(
            "contains invalid characters (allowed: A-Z, a-z, 0-9, '.', '_', '-')",
        ));
    }
    Ok(())
}

/// Return `name` if unused, otherwise `name-<short_id>`.
pub fn disambiguate_display_name(name: &str, short_id: &str, existing: &HashSet<String>) -> String {
    if existing.contains(name) {
        format!("{}-{}", name, short_id)
    } else {
        name.to_string()
    }
}
