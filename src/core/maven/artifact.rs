use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::{InstallerError, InstallerResult};

const DEFAULT_EXTENSION: &str = "jar";

/// A parsed artifact coordinate.
///
/// Supported formats:
///   `group:name:version`
///   `group:name:version:classifier`
///   `group:name:version:classifier@extension`
///   `group:name:version@extension`
///
/// Two artifacts are equal exactly when their canonical strings are equal;
/// the canonical form leaves out `@jar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact {
    group: String,
    name: String,
    version: String,
    classifier: Option<String>,
    extension: String,
}

impl Artifact {
    /// Parse a coordinate string.
    ///
    /// # Examples
    /// ```
    /// use installer_lib::core::maven::Artifact;
    /// let a = Artifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group(), "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> InstallerResult<Self> {
        let malformed = || InstallerError::MalformedCoordinate(coord.to_string());

        let (coord_part, extension) = match coord.rsplit_once('@') {
            Some((head, ext)) => (head, ext),
            None => (coord, DEFAULT_EXTENSION),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(malformed());
        }
        if parts
            .iter()
            .chain(std::iter::once(&extension))
            .any(|segment| !is_valid_segment(segment))
        {
            return Err(malformed());
        }
        // Each group part becomes one directory level.
        if !parts[0].split('.').all(is_valid_segment) {
            return Err(malformed());
        }

        Ok(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
            extension: extension.to_string(),
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `name-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.name, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// Repository-relative path with `/` separators:
    /// `<group as dirs>/<name>/<version>/<filename>`
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version,
            self.filename()
        )
    }

    /// Path relative to the libraries directory.
    pub fn local_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.name);
        path.push(&self.version);
        path.push(self.filename());
        path
    }

    /// Full URL of this artifact under a repository base.
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}",
            repo_base.trim_end_matches('/'),
            self.repository_path()
        )
    }

    pub fn is_jar(&self) -> bool {
        self.extension == DEFAULT_EXTENSION
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', ':', '@'])
        && !segment.chars().any(char::is_whitespace)
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if self.extension != DEFAULT_EXTENSION {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

impl FromStr for Artifact {
    type Err = InstallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Artifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Artifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Artifact::parse(&raw).map_err(serde::de::Error::custom)
    }
}
