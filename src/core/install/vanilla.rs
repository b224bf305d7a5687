// ─── Vanilla Version Manifest ───
// Source of truth for the base artifact when the profile carries no direct
// download: version manifest v2 → version JSON → `downloads.<side>`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::downloader::{Checksum, Transport};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::profile::{DirectDownload, Side};

#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

/// The parts of a vanilla version JSON this installer reads.
#[derive(Debug, Deserialize)]
pub struct VanillaVersion {
    pub id: String,
    #[serde(default)]
    pub downloads: HashMap<String, VanillaDownload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VanillaDownload {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl VanillaVersion {
    pub fn download(&self, side: Side) -> InstallerResult<DirectDownload> {
        let raw = self.downloads.get(side.as_str()).ok_or_else(|| {
            InstallerError::RemoteManifest(format!(
                "{} download info missing from version {}",
                side, self.id
            ))
        })?;
        Ok(DirectDownload {
            url: raw.url.clone(),
            checksum: Checksum::parse_optional(raw.sha1.as_deref())
                .map_err(|e| InstallerError::RemoteManifest(e.to_string()))?,
            size: raw.size,
        })
    }
}

pub struct VanillaResolver {
    transport: Arc<dyn Transport>,
    manifest_url: String,
}

impl VanillaResolver {
    pub fn new(transport: Arc<dyn Transport>, manifest_url: impl Into<String>) -> Self {
        Self {
            transport,
            manifest_url: manifest_url.into(),
        }
    }

    /// Base-artifact download for `minecraft`/`side`. The version JSON is
    /// cached at `cache`; a cached copy that no longer parses is refetched.
    pub async fn resolve(&self, minecraft: &str, side: Side, cache: &Path) -> InstallerResult<DirectDownload> {
        if let Some(version) = read_cached(cache).await {
            if version.id == minecraft {
                debug!("Using cached version JSON {:?}", cache);
                return version.download(side);
            }
        }

        info!("Fetching version manifest for {}", minecraft);
        let manifest: VersionManifest = self.get_json(&self.manifest_url).await?;
        let entry = manifest.find_version(minecraft).ok_or_else(|| {
            InstallerError::RemoteManifest(format!("version {minecraft} not listed in {}", self.manifest_url))
        })?;

        let bytes = self.get_bytes(&entry.url).await?;
        if let Some(expected) = Checksum::parse_optional(entry.sha1.as_deref())
            .map_err(|e| InstallerError::RemoteManifest(e.to_string()))?
        {
            let mut hasher = expected.hasher();
            hasher.update(&bytes);
            let actual = hasher.finalize_hex();
            if !expected.matches(&actual) {
                return Err(InstallerError::RemoteManifest(format!(
                    "version JSON {} checksum mismatch: expected {}, got {}",
                    entry.url, expected, actual
                )));
            }
        }

        let version: VanillaVersion = serde_json::from_slice(&bytes)
            .map_err(|e| InstallerError::RemoteManifest(format!("{}: {}", entry.url, e)))?;
        if let Err(e) = tokio::fs::write(cache, &bytes).await {
            warn!("Could not cache version JSON at {:?}: {}", cache, e);
        }

        version.download(side)
    }

    async fn get_bytes(&self, url: &str) -> InstallerResult<Vec<u8>> {
        let body = self
            .transport
            .get(url)
            .await
            .map_err(|e| InstallerError::RemoteManifest(e.to_string()))?;
        body.collect()
            .await
            .map_err(|e| InstallerError::RemoteManifest(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> InstallerResult<T> {
        let bytes = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| InstallerError::RemoteManifest(format!("{url}: {e}")))
    }
}

async fn read_cached(cache: &Path) -> Option<VanillaVersion> {
    let bytes = tokio::fs::read(cache).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
