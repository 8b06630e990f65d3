//! Base image management: use the local image, else pull it, else build it
//! from the recipe compiled into the binary.

use anyhow::{Context, Result, bail};
use rust_embed::RustEmbed;
use std::path::Path;
use std::process::Stdio;
use tracing::{info, warn};

use super::DockerCli;

/// Dockerfile and init scripts for the lab base image.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct BuildAssets;

pub trait ImageProvider {
    /// Make `tag` available locally, pulling or building as needed.
    fn ensure_image(&self, tag: &str) -> Result<()>;

    fn exists_locally(&self, tag: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct ImageManager {
    docker: DockerCli,
}

impl ImageManager {
    pub fn new(docker: DockerCli) -> Self {
        Self { docker }
    }

    fn pull(&self, tag: &str) -> Result<()> {
        let status = self
            .docker
            .command()
            .args(["pull", tag])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .context("Failed to run docker pull")?;
        if !status.success() {
            bail!("docker pull {} exited with {}", tag, status);
        }
        Ok(())
    }

    fn build(&self, tag: &str) -> Result<()> {
        let context_dir = tempfile::tempdir().context("Failed to create build context")?;
        write_build_context(context_dir.path())?;

        let status = self
            .docker
            .command()
            .args(["build", "-t", tag])
            .arg(context_dir.path())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .context("Failed to run docker build")?;
        if !status.success() {
            bail!("docker build {} exited with {}", tag, status);
        }
        Ok(())
    }
}

impl ImageProvider for ImageManager {
    fn ensure_image(&self, tag: &str) -> Result<()> {
        if self.exists_locally(tag) {
            return Ok(());
        }

        info!(image = tag, "pulling base image");
        match self.pull(tag) {
            Ok(()) => return Ok(()),
            Err(e) => warn!(image = tag, error = %e, "pull failed, building locally"),
        }

        self.build(tag)
            .with_context(|| format!("image {} could not be pulled or built", tag))
    }

    fn exists_locally(&self, tag: &str) -> bool {
        self.docker.run(&["image", "inspect", tag]).is_ok()
    }
}

/// Write the embedded build recipe into `dir`.
pub fn write_build_context(dir: &Path) -> Result<()> {
    for name in BuildAssets::iter() {
        let Some(file) = BuildAssets::get(&name) else {
            continue;
        };
        let path = dir.join(name.as_ref());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &*file.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if name.ends_with(".sh") {
            make_executable(&path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
