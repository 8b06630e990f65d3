//! Typed `devcontainer.json` launch descriptor.
//!
//! A lab's container is described entirely by the descriptor rendered into
//! `<worktree>/.devcontainer/devcontainer.json`:
//!
//! ```text
//! mounts
//! ├── devlab-<purpose>-<labid>   named volumes, one per purpose, per lab
//! ├── <profile_home>/profiles    optional binds, only if present on the host
//! ├── ~/.ssh, ~/.claude.json ...
//! └── <bare repo>                bound at its own path so the worktree's
//!                                `.git` pointer resolves inside the container
//! ```

pub mod features;

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use features::{Feature, FeatureSpec};

pub const VOLUME_PREFIX: &str = "devlab";
pub const DESCRIPTOR_DIR: &str = ".devcontainer";
pub const DESCRIPTOR_FILE: &str = "devcontainer.json";

const REMOTE_USER: &str = "node";
const REMOTE_HOME: &str = "/home/node";
const POST_CREATE: &str = "/usr/local/bin/init-lab-config.sh && /usr/local/bin/init-config-repo.sh && /usr/local/bin/init-profile.sh";

/// Everything the renderer needs to know about one lab.
#[derive(Debug, Clone)]
pub struct DevcontainerConfig {
    pub lab_id: String,
    pub display_name: String,
    pub project_name: String,
    pub profile: String,
    pub image: String,
    pub bare_repo: PathBuf,
    pub home_dir: PathBuf,
    pub profile_home: PathBuf,
    pub git_user_name: Option<String>,
    pub git_user_email: Option<String>,
    pub config_repo: Option<String>,
    pub config_branch: String,
    pub base_profile: Option<String>,
    pub container_env: BTreeMap<String, String>,
    pub features: Vec<FeatureSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    Volume {
        name: String,
        target: String,
    },
    Bind {
        source: PathBuf,
        target: String,
        readonly: bool,
    },
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Volume { name, target } => {
                write!(f, "source={},target={},type=volume", name, target)
            }
            Mount::Bind {
                source,
                target,
                readonly,
            } => {
                write!(f, "source={},target={},type=bind", source.display(), target)?;
                if *readonly {
                    f.write_str(",readonly")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Mount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureOptions {
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Devcontainer {
    pub name: String,
    pub image: String,
    pub features: BTreeMap<String, FeatureOptions>,
    pub remote_user: String,
    pub mounts: Vec<Mount>,
    pub container_env: BTreeMap<String, String>,
    pub workspace_folder: String,
    pub post_create_command: String,
    pub wait_for: String,
}

/// Per-lab volume name. Teardown finds a lab's volumes by its id.
pub fn volume_name(purpose: &str, lab_id: &str) -> String {
    format!("{}-{}-{}", VOLUME_PREFIX, purpose, lab_id)
}

impl Devcontainer {
    pub fn from_config(config: &DevcontainerConfig) -> Self {
        Self {
            name: format!("devlab - {} ({})", config.project_name, config.profile),
            image: config.image.clone(),
            features: build_features(&config.features),
            remote_user: REMOTE_USER.to_string(),
            mounts: build_mounts(config),
            container_env: build_env(config),
            workspace_folder: format!("/workspaces/{}", config.display_name),
            post_create_command: POST_CREATE.to_string(),
            wait_for: "postCreateCommand".to_string(),
        }
    }
}

fn build_features(specs: &[FeatureSpec]) -> BTreeMap<String, FeatureOptions> {
    specs
        .iter()
        .map(|spec| {
            (
                spec.feature.reference().to_string(),
                FeatureOptions {
                    version: spec.version().to_string(),
                },
            )
        })
        .collect()
}

fn build_mounts(config: &DevcontainerConfig) -> Vec<Mount> {
    let volume = |purpose: &str, target: &str| Mount::Volume {
        name: volume_name(purpose, &config.lab_id),
        target: target.to_string(),
    };
    let home = &config.home_dir;

    let mut mounts = vec![
        volume("history", "/commandhistory"),
        volume("config", &remote_path(".claude")),
        volume("profiles", &remote_path(".claudeup")),
    ];

    let optional = [
        (config.profile_home.join("profiles"), remote_path(".claudeup/profiles"), true),
        (config.profile_home.join("ext"), remote_path(".claudeup/ext"), true),
        (home.join(".claude-mem"), remote_path(".claude-mem"), false),
        (home.join(".ssh"), remote_path(".ssh"), true),
        (
            home.join(".claude").join("settings.json"),
            "/tmp/base-settings.json".to_string(),
            true,
        ),
        (home.join(".claude.json"), remote_path(".claude.json"), false),
    ];
    for (source, target, readonly) in optional {
        if source.exists() {
            mounts.push(Mount::Bind {
                source,
                target,
                readonly,
            });
        } else {
            debug!(source = %source.display(), "skipping absent bind mount");
        }
    }

    mounts.push(Mount::Bind {
        source: config.bare_repo.clone(),
        target: config.bare_repo.display().to_string(),
        readonly: false,
    });

    mounts.extend([
        volume("npm", &remote_path(".npm-global")),
        volume("local", &remote_path(".local")),
        volume("bun", &remote_path(".bun")),
    ]);
    mounts
}

fn build_env(config: &DevcontainerConfig) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("CLAUDE_CONFIG_DIR".to_string(), remote_path(".claude"));
    env.insert("CLAUDE_PROFILE".to_string(), config.profile.clone());
    env.insert("CLAUDE_CONFIG_BRANCH".to_string(), config.config_branch.clone());
    env.insert("NODE_OPTIONS".to_string(), "--max-old-space-size=4096".to_string());

    let optional = [
        ("GIT_USER_NAME", &config.git_user_name),
        ("GIT_USER_EMAIL", &config.git_user_email),
        ("CLAUDE_CONFIG_REPO", &config.config_repo),
        ("CLAUDE_BASE_PROFILE", &config.base_profile),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            env.insert(key.to_string(), value.clone());
        }
    }

    env.extend(
        config
            .container_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    env
}

fn remote_path(rel: &str) -> String {
    format!("{}/{}", REMOTE_HOME, rel)
}

/// Writes a lab's launch descriptor into its worktree.
pub trait DescriptorRenderer {
    fn render(&self, config: &DevcontainerConfig, worktree: &Path) -> Result<()>;
}

/// Renders `devcontainer.json` to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRenderer;

impl DescriptorRenderer for FileRenderer {
    fn render(&self, config: &DevcontainerConfig, worktree: &Path) -> Result<()> {
        let dir = worktree.join(DESCRIPTOR_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let descriptor = Devcontainer::from_config(config);
        let json = serde_json::to_string_pretty(&descriptor)
            .context("Failed to serialize devcontainer.json")?;
        let path = dir.join(DESCRIPTOR_FILE);
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}
