//! Dependency installation with `npm`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use super::run_checked;
use crate::error::CollaboratorError;
use crate::ports::DependencyInstaller;

#[derive(Debug, Clone)]
pub struct NpmInstaller {
    npm_path: String,
}

impl NpmInstaller {
    pub fn new(npm_path: impl Into<String>) -> Self {
        Self {
            npm_path: npm_path.into(),
        }
    }

    fn install_command(&self, dir: &Path, registry: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.npm_path);
        cmd.arg("install").current_dir(dir);
        if let Some(registry) = registry {
            cmd.arg("--registry").arg(registry);
        }
        cmd
    }
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new("npm")
    }
}

#[async_trait]
impl DependencyInstaller for NpmInstaller {
    async fn install(&self, dir: &Path, registry: Option<&str>) -> Result<(), CollaboratorError> {
        info!(dir = %dir.display(), registry = ?registry, "Installing dependencies");
        run_checked(self.install_command(dir, registry), "npm install").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_command() {
        let installer = NpmInstaller::default();
        let cmd = installer.install_command(Path::new("/work/t1"), Some("https://registry.example"));
        let std_cmd = cmd.as_std();

        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, ["install", "--registry", "https://registry.example"]);
        assert_eq!(std_cmd.get_current_dir(), Some(Path::new("/work/t1")));
    }

    #[test]
    fn test_install_command_without_registry() {
        let installer = NpmInstaller::default();
        let cmd = installer.install_command(Path::new("/work/t1"), None);
        assert_eq!(cmd.as_std().get_args().count(), 1);
    }
}
