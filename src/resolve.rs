//! Map a short, possibly ambiguous query to exactly one lab record.
//!
//! Precedence:
//! 1. exact ID
//! 2. exact display name
//! 3. ID prefix, project name, or profile name, pooled together
//!
//! Steps 1 and 2 return immediately. Step 3 succeeds only when the pool holds
//! exactly one record.

use std::path::Path;

use crate::errors::{LabError, LabResult};
use crate::state::{LabRecord, StateStore};

pub struct Resolver<'a> {
    store: &'a StateStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    pub fn resolve(&self, query: &str) -> LabResult<LabRecord> {
        resolve_in(self.store.list()?, query)
    }

    pub fn resolve_by_cwd(&self, cwd: &Path) -> LabResult<LabRecord> {
        resolve_by_cwd_in(self.store.list()?, cwd)
    }

    /// Resolve `query` when given, otherwise the lab containing `cwd`.
    pub fn resolve_or_cwd(&self, query: Option<&str>, cwd: &Path) -> LabResult<LabRecord> {
        match query {
            Some(q) if !q.is_empty() => self.resolve(q),
            _ => self.resolve_by_cwd(cwd),
        }
    }
}

pub fn resolve_in(labs: Vec<LabRecord>, query: &str) -> LabResult<LabRecord> {
    if let Some(lab) = labs.iter().find(|lab| lab.id == query) {
        return Ok(lab.clone());
    }
    if let Some(lab) = labs.iter().find(|lab| lab.display_name == query) {
        return Ok(lab.clone());
    }

    let mut matches: Vec<LabRecord> = labs
        .iter()
        .filter(|lab| {
            lab.id.starts_with(query) || lab.project_name == query || lab.profile == query
        })
        .cloned()
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(LabError::NotFound {
            query: query.to_string(),
            available: labs,
        }),
        _ => Err(LabError::Ambiguous {
            query: query.to_string(),
            matches,
        }),
    }
}

/// First lab whose worktree contains `cwd`.
///
/// Containment is by path component, so a worktree at `/w/app` does not
/// claim `/w/app2`.
pub fn resolve_by_cwd_in(labs: Vec<LabRecord>, cwd: &Path) -> LabResult<LabRecord> {
    if let Some(lab) = labs.iter().find(|lab| cwd.starts_with(&lab.worktree)) {
        return Ok(lab.clone());
    }
    Err(LabError::NotFound {
        query: cwd.display().to_string(),
        available: labs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_labs() -> Vec<LabRecord> {
        vec![
            LabRecord::builder("abc-def-123", "myapp-base")
                .project_name("myapp")
                .profile("base")
                .worktree("/labs/workspaces/myapp-base")
                .build(),
            LabRecord::builder("xyz-789", "other")
                .project_name("other")
                .profile("minimal")
                .worktree("/labs/workspaces/other")
                .build(),
        ]
    }

    #[test]
    fn test_resolve_exact_id() {
        let lab = resolve_in(sample_labs(), "xyz-789").unwrap();
        assert_eq!(lab.display_name, "other");
    }

    #[test]
    fn test_resolve_display_name_beats_project_match() {
        let mut labs = sample_labs();
        labs.push(
            LabRecord::builder("qqq-111", "myapp")
                .project_name("myapp-base")
                .build(),
        );
        let lab = resolve_in(labs, "myapp-base").unwrap();
        assert_eq!(lab.id, "abc-def-123");
    }

    #[test]
    fn test_resolve_exact_id_beats_display_name() {
        let mut labs = sample_labs();
        labs.push(LabRecord::builder("zzz-000", "xyz-789").build());
        let lab = resolve_in(labs, "xyz-789").unwrap();
        assert_eq!(lab.display_name, "other");
    }

    #[test]
    fn test_resolve_id_prefix() {
        let lab = resolve_in(sample_labs(), "abc").unwrap();
        assert_eq!(lab.id, "abc-def-123");
    }

    #[test]
    fn test_resolve_project_name() {
        let lab = resolve_in(sample_labs(), "myapp").unwrap();
        assert_eq!(lab.display_name, "myapp-base");
    }

    #[test]
    fn test_resolve_profile_name() {
        let lab = resolve_in(sample_labs(), "minimal").unwrap();
        assert_eq!(lab.id, "xyz-789");
    }

    #[test]
    fn test_resolve_ambiguous_project_lists_both() {
        let labs = vec![
            LabRecord::builder("aaa-1", "shared-one")
                .project_name("shared")
                .build(),
            LabRecord::builder("bbb-2", "shared-two")
                .project_name("shared")
                .build(),
        ];
        match resolve_in(labs, "shared") {
            Err(LabError::Ambiguous { query, matches }) => {
                assert_eq!(query, "shared");
                let names: Vec<_> = matches.iter().map(|m| m.display_name.as_str()).collect();
                assert_eq!(names, vec!["shared-one", "shared-two"]);
            }
            other => panic!("Expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_record_counted_once_across_criteria() {
        let labs = vec![
            LabRecord::builder("base-123", "first")
                .project_name("proj")
                .profile("base")
                .build(),
        ];
        assert_eq!(resolve_in(labs, "base").unwrap().id, "base-123");
    }

    #[test]
    fn test_resolve_no_match_lists_available() {
        match resolve_in(sample_labs(), "nothing") {
            Err(LabError::NotFound { available, .. }) => assert_eq!(available.len(), 2),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_empty_store() {
        let err = resolve_in(Vec::new(), "anything").unwrap_err();
        assert!(err.to_string().contains("no labs found"));
    }

    #[test]
    fn test_resolve_by_cwd_inside_worktree() {
        let lab = resolve_by_cwd_in(
            sample_labs(),
            Path::new("/labs/workspaces/other/src/deep"),
        )
        .unwrap();
        assert_eq!(lab.id, "xyz-789");
    }

    #[test]
    fn test_resolve_by_cwd_exact_worktree() {
        let lab =
            resolve_by_cwd_in(sample_labs(), Path::new("/labs/workspaces/myapp-base")).unwrap();
        assert_eq!(lab.id, "abc-def-123");
    }

    #[test]
    fn test_resolve_by_cwd_sibling_prefix_does_not_match() {
        let result = resolve_by_cwd_in(sample_labs(), Path::new("/labs/workspaces/other2"));
        assert!(matches!(result, Err(LabError::NotFound { .. })));
    }

    #[test]
    fn test_resolver_reads_from_store() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        for lab in sample_labs() {
            store.save(&lab).unwrap();
        }
        let resolver = Resolver::new(&store);
        assert_eq!(resolver.resolve("other").unwrap().id, "xyz-789");
        assert_eq!(
            resolver
                .resolve_or_cwd(None, Path::new("/labs/workspaces/myapp-base/src"))
                .unwrap()
                .id,
            "abc-def-123"
        );
    }
}
