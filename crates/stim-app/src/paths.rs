use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "STIM_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "STIM_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "stim";
const APPLICATION: &str = "stim";

/// Platform directories, each overridable through an environment variable.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        Ok(Self {
            config_dir: env_override(ENV_CONFIG_DIR).unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: env_override(ENV_DATA_DIR).unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// User settings layered over the bundled defaults.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(crate::config::SETTINGS_FILE)
    }

    pub fn stimulus_dir(&self) -> PathBuf {
        self.data_dir.join("stimuli")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { config_dir, data_dir }
    }
}

fn env_override(var: &str) -> Option<PathBuf> {
    env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// `configured` when set, otherwise `fallback`.
pub fn or_default(configured: &str, fallback: PathBuf) -> PathBuf {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        PathBuf::from(trimmed)
    }
}
