use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::model::InstallManifest;
use super::raw::InstallProfileJson;
use crate::core::downloader::MAX_PREALLOCATION;
use crate::core::error::{InstallerError, InstallerResult};

pub const PROFILE_ENTRY: &str = "install_profile.json";

/// Where the profile and its bundled files live: an unpacked directory or
/// an installer archive (zip).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerBundle {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl InstallerBundle {
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::Archive(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(p) | Self::Archive(p) => p,
        }
    }

    /// Read and validate the profile plus the version descriptor it names.
    pub async fn load_manifest(&self) -> InstallerResult<InstallManifest> {
        let bundle = self.clone();
        tokio::task::spawn_blocking(move || bundle.load_manifest_blocking())
            .await
            .map_err(|e| InstallerError::Other(format!("Task join error: {e}")))?
    }

    fn load_manifest_blocking(&self) -> InstallerResult<InstallManifest> {
        let raw = self.read_entry(PROFILE_ENTRY)?.ok_or_else(|| {
            InstallerError::InvalidManifest(format!(
                "{} not found in {}",
                PROFILE_ENTRY,
                self.path().display()
            ))
        })?;
        let profile = InstallProfileJson::parse(&String::from_utf8_lossy(&raw))?;

        let descriptor = match profile.json.as_deref() {
            Some(entry) => match self.read_entry(entry)? {
                Some(bytes) => Some(serde_json::from_slice(&bytes)?),
                None => {
                    debug!("Version descriptor {} missing from bundle", entry);
                    None
                }
            },
            None => None,
        };

        let manifest = profile.into_manifest(descriptor)?;
        info!(
            "Loaded profile {} {} ({} libraries, {} processors)",
            manifest.profile,
            manifest.version,
            manifest.libraries().len(),
            manifest.processors.len()
        );
        Ok(manifest)
    }

    /// Contents of a bundled file, `None` when absent. Leading `/` is ignored.
    pub fn read_entry(&self, name: &str) -> InstallerResult<Option<Vec<u8>>> {
        let name = name.trim_start_matches('/');
        match self {
            Self::Directory(root) => {
                let path = root.join(name);
                match std::fs::read(&path) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(InstallerError::io(path, e)),
                }
            }
            Self::Archive(path) => {
                let file = std::fs::File::open(path).map_err(|e| InstallerError::io(path, e))?;
                let mut archive = zip::ZipArchive::new(file)?;
                let mut entry = match archive.by_name(name) {
                    Ok(entry) => entry,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let hint = entry.size().min(MAX_PREALLOCATION as u64) as usize;
                let mut bytes = Vec::with_capacity(hint);
                entry.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
        }
    }

    /// Bundled copy of a library (`maven/<repository path>`), if shipped.
    pub fn read_artifact(&self, repository_path: &str) -> InstallerResult<Option<Vec<u8>>> {
        self.read_entry(&format!("maven/{repository_path}"))
    }
}
