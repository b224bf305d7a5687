use std::collections::HashSet;

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::Artifact;
use crate::core::profile::InstallManifest;

/// Decides which optional libraries are installed. Evaluated once per
/// optional entry.
pub trait IncludeOptional: Send + Sync {
    fn include(&self, artifact: &Artifact) -> bool;
}

impl<F> IncludeOptional for F
where
    F: Fn(&Artifact) -> bool + Send + Sync,
{
    fn include(&self, artifact: &Artifact) -> bool {
        self(artifact)
    }
}

/// Set of optional libraries checked against a manifest, so a misspelled
/// coordinate is an error instead of silently matching nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalSelection {
    enabled: HashSet<Artifact>,
}

impl OptionalSelection {
    pub fn none() -> Self {
        Self::default()
    }

    /// Every optional whose manifest entry is enabled by default.
    pub fn defaults(manifest: &InstallManifest) -> Self {
        Self {
            enabled: manifest
                .optionals()
                .filter(|l| l.optional_info().is_some_and(|i| i.default_enabled))
                .map(|l| l.artifact().clone())
                .collect(),
        }
    }

    pub fn all(manifest: &InstallManifest) -> Self {
        Self {
            enabled: manifest.optionals().map(|l| l.artifact().clone()).collect(),
        }
    }

    pub fn from_names<S: AsRef<str>>(manifest: &InstallManifest, names: &[S]) -> InstallerResult<Self> {
        let mut enabled = HashSet::new();
        for name in names {
            let artifact = Artifact::parse(name.as_ref())?;
            if manifest.optional(&artifact).is_none() {
                return Err(InstallerError::UnknownOptional(artifact.to_string()));
            }
            enabled.insert(artifact);
        }
        Ok(Self { enabled })
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl IncludeOptional for OptionalSelection {
    fn include(&self, artifact: &Artifact) -> bool {
        self.enabled.contains(artifact)
    }
}
