use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::downloader::DEFAULT_CONCURRENCY;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::http::DEFAULT_USER_AGENT;

pub const SETTINGS_FILE: &str = "installer_settings.json";
pub const VERSION_MANIFEST_URL: &str = "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Parallel library downloads.
    pub concurrency: usize,
    /// Java executable used for JAR processors.
    pub java_path: PathBuf,
    pub user_agent: String,
    pub version_manifest_url: String,
    pub default_target: Option<PathBuf>,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            java_path: PathBuf::from("java"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
            default_target: None,
        }
    }
}

impl InstallerSettings {
    /// Read settings from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> InstallerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| InstallerError::io(path, e))?;
        let settings: Self = serde_json::from_str(&raw)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Settings from `path` when given, else from `installer_settings.json`
    /// in the working directory if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> InstallerResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(SETTINGS_FILE);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Configured target, else the platform launcher directory.
    pub fn target_or_default(&self) -> PathBuf {
        self.default_target
            .clone()
            .unwrap_or_else(default_minecraft_dir)
    }
}

/// `%APPDATA%\.minecraft`, `~/Library/Application Support/minecraft` or
/// `~/.minecraft`.
pub fn default_minecraft_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("minecraft")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    }
}
