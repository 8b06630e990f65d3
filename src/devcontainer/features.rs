//! Devcontainer features a lab can request with `--feature name[:version]`.

use std::fmt;
use std::str::FromStr;

use crate::errors::LabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Go,
    Rust,
    Python,
    Node,
    Java,
    Dotnet,
    DockerInDocker,
    GithubCli,
    Terraform,
    AwsCli,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Go,
        Feature::Rust,
        Feature::Python,
        Feature::Node,
        Feature::Java,
        Feature::Dotnet,
        Feature::DockerInDocker,
        Feature::GithubCli,
        Feature::Terraform,
        Feature::AwsCli,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Go => "go",
            Feature::Rust => "rust",
            Feature::Python => "python",
            Feature::Node => "node",
            Feature::Java => "java",
            Feature::Dotnet => "dotnet",
            Feature::DockerInDocker => "docker-in-docker",
            Feature::GithubCli => "github-cli",
            Feature::Terraform => "terraform",
            Feature::AwsCli => "aws-cli",
        }
    }

    /// OCI reference the devcontainer CLI installs the feature from.
    pub fn reference(self) -> &'static str {
        match self {
            Feature::Go => "ghcr.io/devcontainers/features/go:1",
            Feature::Rust => "ghcr.io/devcontainers/features/rust:1",
            Feature::Python => "ghcr.io/devcontainers/features/python:1",
            Feature::Node => "ghcr.io/devcontainers/features/node:1",
            Feature::Java => "ghcr.io/devcontainers/features/java:1",
            Feature::Dotnet => "ghcr.io/devcontainers/features/dotnet:2",
            Feature::DockerInDocker => "ghcr.io/devcontainers/features/docker-in-docker:2",
            Feature::GithubCli => "ghcr.io/devcontainers/features/github-cli:1",
            Feature::Terraform => "ghcr.io/devcontainers/features/terraform:1",
            Feature::AwsCli => "ghcr.io/devcontainers/features/aws-cli:1",
        }
    }

    pub fn default_version(self) -> &'static str {
        match self {
            Feature::Python => "3.12",
            Feature::Node => "lts",
            Feature::Java => "21",
            _ => "latest",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| LabError::Validation {
                what: "feature",
                value: s.to_string(),
                reason: "unknown feature (known: go, rust, python, node, java, dotnet, docker-in-docker, github-cli, terraform, aws-cli)",
            })
    }
}

/// A requested feature with an optional version pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub feature: Feature,
    pub version: Option<String>,
}

impl FeatureSpec {
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            version: None,
        }
    }

    /// The pinned version, or the feature's default.
    pub fn version(&self) -> &str {
        self.version
            .as_deref()
            .unwrap_or_else(|| self.feature.default_version())
    }
}

impl FromStr for FeatureSpec {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once(':') {
            Some((name, version)) => (name, Some(version.trim())),
            None => (s, None),
        };
        Ok(Self {
            feature: name.parse()?,
            version: version.filter(|v| !v.is_empty()).map(str::to_string),
        })
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}", self.feature, v),
            None => write!(f, "{}", self.feature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only_uses_default_version() {
        let spec: FeatureSpec = "python".parse().unwrap();
        assert_eq!(spec.feature, Feature::Python);
        assert_eq!(spec.version, None);
        assert_eq!(spec.version(), "3.12");
    }

    #[test]
    fn test_parse_pinned_version() {
        let spec: FeatureSpec = "go:1.23".parse().unwrap();
        assert_eq!(spec.feature, Feature::Go);
        assert_eq!(spec.version(), "1.23");
        assert_eq!(spec.to_string(), "go:1.23");
    }

    #[test]
    fn test_parse_empty_version_falls_back() {
        let spec: FeatureSpec = "rust:".parse().unwrap();
        assert_eq!(spec.version(), "latest");
    }

    #[test]
    fn test_parse_unknown_feature() {
        let err = "cobol:85".parse::<FeatureSpec>().unwrap_err();
        assert!(matches!(err, LabError::Validation { what: "feature", .. }));
        assert!(err.to_string().contains("cobol"));
    }

    #[test]
    fn test_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>().unwrap(), feature);
            assert!(feature.reference().starts_with("ghcr.io/devcontainers/features/"));
        }
    }
}
