//! Runtime configuration for devlab.
//!
//! All environment-derived settings are collected here once, in
//! [`LabConfig::load`], and passed explicitly into the components that need
//! them. Library code never reads the process environment itself.
//!
//! Layering: built-in defaults → `<base_dir>/config.toml` → environment.
//!
//! ```toml
//! image = "ghcr.io/devlab/devlab:latest"
//! profile_cmd = "claudeup"
//! profile_home = "/home/me/.claudeup"
//!
//! [container]
//! config_repo = "git@github.com:me/dotfiles.git"
//! config_branch = "main"
//!
//! [container.env]
//! NODE_OPTIONS = "--max-old-space-size=8192"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::worktree::git::global_config_value;

pub const DEFAULT_IMAGE: &str = "ghcr.io/devlab/devlab:latest";
pub const DEFAULT_PROFILE_CMD: &str = "claudeup";
pub const CONFIG_FILE: &str = "config.toml";

/// Host variables forwarded into every lab container when set.
pub const PASSTHROUGH_ENV: &[&str] = &["GITHUB_TOKEN", "CONTEXT7_API_KEY"];

#[derive(Debug, Clone)]
pub struct LabConfig {
    /// Root of `state/`, `repos/` and `workspaces/`.
    pub base_dir: PathBuf,
    pub home_dir: PathBuf,
    /// Home of the profile tool; holds `profiles/` and `ext/`.
    pub profile_home: PathBuf,
    pub image: String,
    pub profile_cmd: String,
    /// Binaries that must be on PATH before a lab can start.
    pub required_tools: Vec<String>,
    pub git_user_name: Option<String>,
    pub git_user_email: Option<String>,
    pub config_repo: Option<String>,
    pub config_branch: String,
    /// Extra values placed in the container environment.
    pub container_env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    image: Option<String>,
    profile_cmd: Option<String>,
    profile_home: Option<PathBuf>,
    #[serde(default)]
    container: ContainerSection,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerSection {
    config_repo: Option<String>,
    config_branch: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl LabConfig {
    /// Defaults rooted at `base_dir`, with nothing read from the host.
    pub fn new(base_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        Self {
            base_dir: base_dir.into(),
            profile_home: home_dir.join(".claudeup"),
            home_dir,
            image: DEFAULT_IMAGE.to_string(),
            profile_cmd: DEFAULT_PROFILE_CMD.to_string(),
            required_tools: vec!["git".to_string(), "devcontainer".to_string()],
            git_user_name: None,
            git_user_email: None,
            config_repo: None,
            config_branch: "main".to_string(),
            container_env: BTreeMap::new(),
        }
    }

    /// Build the configuration from the host: home directory, config file,
    /// environment and global git identity.
    pub fn load() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        let base_dir = std::env::var_os("DEVLAB_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir.join(".devlab"));

        let mut config = Self::new(base_dir, home_dir);
        let file = config.config_file();
        config.apply_file(&file)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.git_user_name = global_config_value("user.name");
        config.git_user_email = global_config_value("user.email");
        Ok(config)
    }

    /// Overlay settings from a TOML file. A missing file is not an error.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(image) = file.image {
            self.image = image;
        }
        if let Some(cmd) = file.profile_cmd {
            self.profile_cmd = cmd;
        }
        if let Some(home) = file.profile_home {
            self.profile_home = home;
        }
        if let Some(repo) = file.container.config_repo {
            self.config_repo = Some(repo);
        }
        if let Some(branch) = file.container.config_branch {
            self.config_branch = branch;
        }
        self.container_env.extend(file.container.env);
        Ok(())
    }

    /// Overlay settings from environment variables, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(image) = non_empty("DEVLAB_IMAGE") {
            self.image = image;
        }
        if let Some(home) = non_empty("DEVLAB_PROFILE_HOME") {
            self.profile_home = PathBuf::from(home);
        }
        if let Some(repo) = non_empty("DEVLAB_CONFIG_REPO") {
            self.config_repo = Some(repo);
        }
        if let Some(branch) = non_empty("DEVLAB_CONFIG_BRANCH") {
            self.config_branch = branch;
        }
        for key in PASSTHROUGH_ENV {
            if let Some(value) = non_empty(key) {
                self.container_env.insert(key.to_string(), value);
            }
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.base_dir.join("state")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.base_dir.join("repos")
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.base_dir.join("workspaces")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.profile_home.join("profiles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_layout() {
        let config = LabConfig::new("/base", "/home/me");
        assert_eq!(config.state_dir(), PathBuf::from("/base/state"));
        assert_eq!(config.repos_dir(), PathBuf::from("/base/repos"));
        assert_eq!(config.workspaces_dir(), PathBuf::from("/base/workspaces"));
        assert_eq!(config.profiles_dir(), PathBuf::from("/home/me/.claudeup/profiles"));
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert_eq!(config.config_branch, "main");
    }

    #[test]
    fn test_apply_missing_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let mut config = LabConfig::new(dir.path(), "/home/me");
        config.apply_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.image, DEFAULT_IMAGE);
    }

    #[test]
    fn test_apply_file_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
image = "local/lab:dev"
profile_cmd = "profiles-cli"

[container]
config_branch = "develop"

[container.env]
NODE_OPTIONS = "--max-old-space-size=8192"
"#,
        )
        .unwrap();

        let mut config = LabConfig::new(dir.path(), "/home/me");
        config.apply_file(&path).unwrap();
        assert_eq!(config.image, "local/lab:dev");
        assert_eq!(config.profile_cmd, "profiles-cli");
        assert_eq!(config.config_branch, "develop");
        assert_eq!(
            config.container_env.get("NODE_OPTIONS").unwrap(),
            "--max-old-space-size=8192"
        );
    }

    #[test]
    fn test_apply_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not valid toml {{{{").unwrap();
        let mut config = LabConfig::new(dir.path(), "/home/me");
        assert!(config.apply_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "image = \"from-file\"\n").unwrap();

        let env: HashMap<&str, &str> = [
            ("DEVLAB_IMAGE", "from-env"),
            ("GITHUB_TOKEN", "ghp_secret"),
            ("DEVLAB_CONFIG_REPO", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = LabConfig::new(dir.path(), "/home/me");
        config.apply_file(&path).unwrap();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.image, "from-env");
        assert_eq!(config.container_env.get("GITHUB_TOKEN").unwrap(), "ghp_secret");
        assert!(config.config_repo.is_none());
        assert!(!config.container_env.contains_key("CONTEXT7_API_KEY"));
    }
}
