//! Optional per-repository settings, read from `.testrun.yml`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

use crate::error::RepoConfigError;

pub const REPO_CONFIG_FILE: &str = ".testrun.yml";

/// Settings a repository can ship alongside its tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Test directory, relative to the repository root.
    pub directory: Option<String>,

    /// Extra environment for the test run. Task overrides take precedence.
    pub env: BTreeMap<String, String>,
}

impl RepoConfig {
    /// Load the config from a checked-out repository.
    ///
    /// Returns `Ok(None)` when the repository has no config file.
    pub async fn load(repo_dir: &Path) -> Result<Option<Self>, RepoConfigError> {
        let path = repo_dir.join(REPO_CONFIG_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RepoConfigError::Read { path, source }),
        };

        // An empty file is valid YAML for "nothing set".
        if raw.trim().is_empty() {
            return Ok(Some(Self::default()));
        }

        serde_yaml::from_str(&raw)
            .map(Some)
            .map_err(|source| RepoConfigError::Parse { path, source })
    }

    /// Merge the task's overrides over the repository's environment.
    pub fn resolve_env(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}
