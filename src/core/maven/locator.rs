use std::path::{Path, PathBuf};

use super::artifact::Artifact;
use crate::core::profile::{LibraryEntry, Mirror};

/// Maps artifacts to local paths and ordered source URLs.
///
/// Pure: no I/O happens here.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactLocator<'a> {
    mirrors: &'a [Mirror],
}

impl<'a> ArtifactLocator<'a> {
    pub fn new(mirrors: &'a [Mirror]) -> Self {
        Self { mirrors }
    }

    /// Absolute destination of `artifact` under `libraries_root`.
    pub fn destination(&self, artifact: &Artifact, libraries_root: &Path) -> PathBuf {
        libraries_root.join(artifact.local_path())
    }

    /// Explicit entry URLs first, then one URL per mirror, duplicates removed.
    pub fn candidate_urls(&self, entry: &LibraryEntry) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(entry.urls.len() + self.mirrors.len());
        let mirrored = self.mirrors.iter().map(|m| entry.artifact.url(&m.url));

        for url in entry.urls.iter().cloned().chain(mirrored) {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }

        urls
    }
}
