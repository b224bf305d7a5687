// ─── install_profile.json ───
// Serde shape of the profile as shipped, converted into `InstallManifest`.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::model::{
    DataValue, DirectDownload, InstallManifest, LibraryEntry, LibraryKind, ManifestLibrary,
    Mirror, ModListType, OptionalInfo, ProcessorOutput, ProcessorStep, RunCondition, Side,
};
use crate::core::downloader::Checksum;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::Artifact;

/// Only this profile spec revision is understood.
pub const SUPPORTED_SPEC: u32 = 0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProfileJson {
    #[serde(default)]
    pub spec: u32,
    pub profile: String,
    pub version: String,
    pub minecraft: String,
    /// Entry name of the version descriptor inside the bundle.
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub mod_list: ModListType,
    #[serde(default)]
    pub mirrors: Vec<Mirror>,
    #[serde(default)]
    pub downloads: HashMap<Side, RawDownload>,
    #[serde(default)]
    pub libraries: Vec<RawLibrary>,
    #[serde(default)]
    pub optionals: Vec<RawOptional>,
    #[serde(default)]
    pub processors: Vec<RawProcessor>,
    #[serde(default)]
    pub data: BTreeMap<String, RawDataValue>,
}

#[derive(Debug, Deserialize)]
pub struct RawDownload {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl RawDownload {
    fn checksum(&self) -> InstallerResult<Option<Checksum>> {
        match Checksum::parse_optional(self.sha256.as_deref())? {
            Some(c) => Ok(Some(c)),
            None => Checksum::parse_optional(self.sha1.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawLibrary {
    pub name: String,
    /// Legacy repository base; the artifact URL is derived from it.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<RawLibraryDownloads>,
}

#[derive(Debug, Deserialize)]
pub struct RawLibraryDownloads {
    #[serde(default)]
    pub artifact: Option<RawDownload>,
}

#[derive(Debug, Deserialize)]
pub struct RawOptional {
    pub name: String,
    pub artifact: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub inject: bool,
    #[serde(default, rename = "mod")]
    pub is_mod: bool,
    #[serde(default)]
    pub maven: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawProcessor {
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub sides: Option<Vec<Side>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawDataValue {
    Plain(String),
    PerSide {
        #[serde(default)]
        client: Option<String>,
        #[serde(default)]
        server: Option<String>,
    },
}

impl InstallProfileJson {
    pub fn parse(raw: &str) -> InstallerResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn into_manifest(
        self,
        version_descriptor: Option<serde_json::Value>,
    ) -> InstallerResult<InstallManifest> {
        if self.spec != SUPPORTED_SPEC {
            return Err(InstallerError::InvalidManifest(format!(
                "profile spec {} is not supported, only {} is",
                self.spec, SUPPORTED_SPEC
            )));
        }

        let mut libraries = Vec::with_capacity(self.libraries.len() + self.optionals.len());
        for lib in self.libraries {
            libraries.push(lib.into_library()?);
        }
        for opt in self.optionals {
            libraries.push(opt.into_library()?);
        }

        let mut manifest = InstallManifest::new(self.profile, self.version, self.minecraft, libraries)?;

        for (side, download) in self.downloads {
            let checksum = download.checksum()?;
            if download.url.trim().is_empty() {
                continue;
            }
            manifest.base_downloads.insert(
                side,
                DirectDownload {
                    url: download.url,
                    checksum,
                    size: download.size,
                },
            );
        }

        manifest.processors = self
            .processors
            .into_iter()
            .map(RawProcessor::into_step)
            .collect::<InstallerResult<_>>()?;
        manifest.data = self
            .data
            .into_iter()
            .map(|(k, v)| (k, v.into_value()))
            .collect();
        manifest.mirrors = self.mirrors;
        manifest.mod_list = self.mod_list;
        manifest.version_descriptor = version_descriptor;

        Ok(manifest)
    }
}

impl RawLibrary {
    fn into_library(self) -> InstallerResult<ManifestLibrary> {
        let artifact = Artifact::parse(&self.name)?;
        let artifact_dl = self.downloads.and_then(|d| d.artifact);

        let mut urls = Vec::new();
        let (checksum, size) = match &artifact_dl {
            Some(dl) => {
                if !dl.url.trim().is_empty() {
                    urls.push(dl.url.clone());
                }
                (dl.checksum()?, dl.size)
            }
            None => (None, None),
        };
        if let Some(repo) = self.url.as_deref().filter(|r| !r.trim().is_empty()) {
            urls.push(artifact.url(repo));
        }

        Ok(ManifestLibrary {
            entry: LibraryEntry {
                artifact,
                checksum,
                size,
                urls,
            },
            kind: LibraryKind::Required,
        })
    }
}

impl RawOptional {
    fn into_library(self) -> InstallerResult<ManifestLibrary> {
        let artifact = Artifact::parse(&self.artifact)?;
        let checksum = match Checksum::parse_optional(self.sha256.as_deref())? {
            Some(c) => Some(c),
            None => Checksum::parse_optional(self.sha1.as_deref())?,
        };

        let mut urls = Vec::new();
        if let Some(url) = self.url.filter(|u| !u.trim().is_empty()) {
            urls.push(url);
        }
        if let Some(repo) = self.maven.as_deref().filter(|r| !r.trim().is_empty()) {
            urls.push(artifact.url(repo));
        }

        Ok(ManifestLibrary {
            entry: LibraryEntry {
                artifact,
                checksum,
                size: self.size,
                urls,
            },
            kind: LibraryKind::Optional(OptionalInfo {
                display_name: self.name,
                description: self.description,
                default_enabled: self.default,
                inject: self.inject,
                is_mod: self.is_mod,
                maven: self.maven,
            }),
        })
    }
}

impl RawProcessor {
    fn into_step(self) -> InstallerResult<ProcessorStep> {
        let condition = if self.outputs.is_empty() {
            RunCondition::Always
        } else {
            RunCondition::IfOutputsMissing(
                self.outputs
                    .into_iter()
                    .map(|(path, checksum)| ProcessorOutput {
                        path,
                        checksum: Some(checksum).filter(|c| !c.trim().is_empty()),
                    })
                    .collect(),
            )
        };

        Ok(ProcessorStep {
            jar: Artifact::parse(&self.jar)?,
            classpath: self
                .classpath
                .iter()
                .map(|c| Artifact::parse(c))
                .collect::<InstallerResult<_>>()?,
            args: self.args,
            sides: self.sides,
            condition,
        })
    }
}

impl RawDataValue {
    fn into_value(self) -> DataValue {
        match self {
            RawDataValue::Plain(v) => DataValue::Shared(v),
            RawDataValue::PerSide { client, server } => DataValue::PerSide { client, server },
        }
    }
}
