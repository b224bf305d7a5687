use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::downloader::Checksum;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::Artifact;

/// Installable target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternate repository base, tried after an entry's explicit URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub homepage: Option<String>,
}

/// One downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub artifact: Artifact,
    /// `None` means the artifact is trusted without verification.
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
    /// Explicit download URLs, most preferred first.
    pub urls: Vec<String>,
}

/// Extra data carried by optional libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalInfo {
    pub display_name: String,
    pub description: String,
    pub default_enabled: bool,
    /// Add to the written version descriptor's `libraries`.
    pub inject: bool,
    /// List in `mod_list.json`.
    pub is_mod: bool,
    /// Repository recorded for injected entries.
    pub maven: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryKind {
    Required,
    Optional(OptionalInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLibrary {
    pub entry: LibraryEntry,
    pub kind: LibraryKind,
}

impl ManifestLibrary {
    pub fn artifact(&self) -> &Artifact {
        &self.entry.artifact
    }

    pub fn optional_info(&self) -> Option<&OptionalInfo> {
        match &self.kind {
            LibraryKind::Required => None,
            LibraryKind::Optional(info) => Some(info),
        }
    }
}

/// Direct download info for a side's base artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDownload {
    pub url: String,
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
}

/// An output a processor is expected to produce. Both fields are token
/// templates resolved at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOutput {
    pub path: String,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunCondition {
    Always,
    /// Skipped when every output already exists and matches.
    IfOutputsMissing(Vec<ProcessorOutput>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorStep {
    pub jar: Artifact,
    pub classpath: Vec<Artifact>,
    pub args: Vec<String>,
    /// `None` runs on every side.
    pub sides: Option<Vec<Side>>,
    pub condition: RunCondition,
}

impl ProcessorStep {
    pub fn applies_to(&self, side: Side) -> bool {
        self.sides.as_ref().map_or(true, |s| s.contains(&side))
    }
}

/// Token value shared between processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    Shared(String),
    PerSide {
        client: Option<String>,
        server: Option<String>,
    },
}

impl DataValue {
    pub fn for_side(&self, side: Side) -> Option<&str> {
        match self {
            DataValue::Shared(v) => Some(v),
            DataValue::PerSide { client, server } => match side {
                Side::Client => client.as_deref(),
                Side::Server => server.as_deref(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModListType {
    None,
    #[default]
    Relative,
    Absolute,
}

/// Validated, read-only install profile.
#[derive(Debug, Clone)]
pub struct InstallManifest {
    pub profile: String,
    pub version: String,
    pub minecraft: String,
    pub base_downloads: HashMap<Side, DirectDownload>,
    pub processors: Vec<ProcessorStep>,
    pub data: BTreeMap<String, DataValue>,
    pub mirrors: Vec<Mirror>,
    pub mod_list: ModListType,
    /// Version descriptor shipped with the profile, if one was found.
    pub version_descriptor: Option<serde_json::Value>,
    libraries: Vec<ManifestLibrary>,
}

impl InstallManifest {
    pub(crate) fn new(
        profile: String,
        version: String,
        minecraft: String,
        libraries: Vec<ManifestLibrary>,
    ) -> InstallerResult<Self> {
        for (field, value) in [("profile", &profile), ("version", &version), ("minecraft", &minecraft)] {
            if value.trim().is_empty() {
                return Err(InstallerError::InvalidManifest(format!("`{field}` is empty")));
            }
        }
        // `version` names the descriptor file inside the target.
        if version == "." || version == ".." || version.contains(['/', '\\']) {
            return Err(InstallerError::InvalidManifest(format!(
                "`version` {version:?} is not a plain file name"
            )));
        }

        Ok(Self {
            profile,
            version,
            minecraft,
            base_downloads: HashMap::new(),
            processors: Vec::new(),
            data: BTreeMap::new(),
            mirrors: Vec::new(),
            mod_list: ModListType::default(),
            version_descriptor: None,
            libraries: dedupe_libraries(libraries)?,
        })
    }

    /// All libraries, required and optional, in manifest order.
    pub fn libraries(&self) -> &[ManifestLibrary] {
        &self.libraries
    }

    pub fn required(&self) -> impl Iterator<Item = &ManifestLibrary> {
        self.libraries
            .iter()
            .filter(|l| matches!(l.kind, LibraryKind::Required))
    }

    pub fn optionals(&self) -> impl Iterator<Item = &ManifestLibrary> {
        self.libraries
            .iter()
            .filter(|l| matches!(l.kind, LibraryKind::Optional(_)))
    }

    pub fn optional(&self, artifact: &Artifact) -> Option<&ManifestLibrary> {
        self.optionals().find(|l| l.artifact() == artifact)
    }

    pub fn processors_for(&self, side: Side) -> impl Iterator<Item = &ProcessorStep> {
        self.processors.iter().filter(move |p| p.applies_to(side))
    }

    /// Tokens for `side`, before run-time values are merged in.
    pub fn data_for(&self, side: Side) -> BTreeMap<String, String> {
        self.data
            .iter()
            .filter_map(|(k, v)| v.for_side(side).map(|v| (k.clone(), v.to_string())))
            .collect()
    }

    pub fn sponsor_message(&self) -> Option<String> {
        self.mirrors.iter().find_map(|m| {
            let name = m.name.as_deref()?;
            Some(match &m.homepage {
                Some(home) => format!("Data kindly mirrored by {name} ({home})"),
                None => format!("Data kindly mirrored by {name}"),
            })
        })
    }
}

/// Keeps first position, last value; rejects distinct coordinates that land
/// on the same path.
fn dedupe_libraries(libraries: Vec<ManifestLibrary>) -> InstallerResult<Vec<ManifestLibrary>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut paths: HashMap<PathBuf, String> = HashMap::new();
    let mut out: Vec<ManifestLibrary> = Vec::with_capacity(libraries.len());

    for library in libraries {
        let key = library.artifact().to_string();
        if let Some(&slot) = index.get(&key) {
            out[slot] = library;
            continue;
        }

        let path = library.artifact().local_path();
        if let Some(other) = paths.insert(path.clone(), key.clone()) {
            return Err(InstallerError::InvalidManifest(format!(
                "{key} and {other} both map to {}",
                path.display()
            )));
        }

        index.insert(key, out.len());
        out.push(library);
    }

    Ok(out)
}
