use std::path::{Path, PathBuf};

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::profile::Side;

pub const LAUNCHER_PROFILES: &str = "launcher_profiles.json";
const STORE_LAUNCHER_PROFILES: &str = "launcher_profiles_microsoft_store.json";

impl Side {
    /// Whether `dir` can receive an installation of this side.
    pub fn is_valid_target(&self, dir: &Path) -> bool {
        if !dir.is_dir() {
            return false;
        }
        match self {
            Side::Client => {
                dir.join(LAUNCHER_PROFILES).is_file() || dir.join(STORE_LAUNCHER_PROFILES).is_file()
            }
            Side::Server => true,
        }
    }

    /// User-facing remediation for a target rejected by `is_valid_target`.
    pub fn target_error(&self, dir: &Path) -> String {
        match (self, dir.exists()) {
            (Side::Client, true) => {
                "The directory is missing a launcher profile. Please run the minecraft launcher first".into()
            }
            (Side::Client, false) => "There is no minecraft directory set up. Either choose an alternative, or run the minecraft launcher to create one".into(),
            (Side::Server, true) => "The specified path needs to be a directory".into(),
            (Side::Server, false) => format!(
                "There is no directory at {}. Create it first, the installer never creates an installation root",
                dir.display()
            ),
        }
    }

    /// Well-known location of the base artifact inside `target`.
    pub fn base_artifact_path(&self, target: &Path, minecraft: &str) -> PathBuf {
        match self {
            Side::Client => target.join("client.jar"),
            Side::Server => target.join(format!("minecraft_server.{minecraft}.jar")),
        }
    }
}

pub(crate) fn validate_target(side: Side, target: &Path) -> InstallerResult<()> {
    if side.is_valid_target(target) {
        Ok(())
    } else {
        Err(InstallerError::InvalidTarget {
            path: target.to_path_buf(),
            message: side.target_error(target),
        })
    }
}
