use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checksum::file_satisfies;
use super::transport::Transport;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::ArtifactLocator;
use crate::core::profile::{InstallerBundle, LibraryEntry, Mirror};
use crate::core::progress::ProgressSink;

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Result of fetching one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A verified file was already in place; no network access happened.
    AlreadyPresent,
    Fetched { bytes: u64 },
    /// Every candidate was exhausted; nothing is left at the destination.
    Failed { reason: String },
}

/// Aggregate of a batch fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub already_present: usize,
    pub bytes: u64,
    /// `(coordinate, reason)`, sorted by coordinate.
    pub failures: Vec<(String, String)>,
}

impl BatchReport {
    pub fn failed_coordinates(&self) -> Vec<String> {
        self.failures.iter().map(|(c, _)| c.clone()).collect()
    }
}

enum Source<'a> {
    Bundled(String),
    Url(&'a str),
}

impl Source<'_> {
    fn describe(&self) -> String {
        match self {
            Source::Bundled(entry) => format!("bundled maven/{entry}"),
            Source::Url(url) => url.to_string(),
        }
    }
}

/// Checksum-verifying, mirror-aware artifact downloader.
///
/// Every write goes to a unique temporary file next to the destination and is
/// renamed into place only after verification, so distinct entries can be
/// fetched concurrently into the same tree.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ProgressSink>,
    mirrors: Vec<Mirror>,
    bundle: Option<InstallerBundle>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            transport,
            sink,
            mirrors: Vec::new(),
            bundle: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_mirrors(mut self, mirrors: Vec<Mirror>) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// Libraries shipped inside `bundle` under `maven/` are used before any URL.
    pub fn with_bundle(mut self, bundle: Option<InstallerBundle>) -> Self {
        self.bundle = bundle;
        self
    }

    // ── Single artifact ─────────────────────────────────

    /// Fetch a library into its canonical place under `libraries_root`.
    pub async fn fetch(&self, entry: &LibraryEntry, libraries_root: &Path) -> FetchOutcome {
        let locator = ArtifactLocator::new(&self.mirrors);
        let dest = locator.destination(&entry.artifact, libraries_root);
        let urls = locator.candidate_urls(entry);

        let mut sources = Vec::with_capacity(urls.len() + 1);
        if self.bundle.is_some() {
            sources.push(Source::Bundled(entry.artifact.repository_path()));
        }
        sources.extend(urls.iter().map(|u| Source::Url(u)));

        self.fetch_from(entry, &dest, sources).await
    }

    /// Fetch `entry` to an explicit path using only its own URLs.
    pub async fn fetch_to(&self, entry: &LibraryEntry, dest: &Path) -> FetchOutcome {
        let sources = entry.urls.iter().map(|u| Source::Url(u)).collect();
        self.fetch_from(entry, dest, sources).await
    }

    async fn fetch_from(
        &self,
        entry: &LibraryEntry,
        dest: &Path,
        sources: Vec<Source<'_>>,
    ) -> FetchOutcome {
        let artifact = entry.artifact.to_string();

        match file_satisfies(dest, entry.checksum.as_ref()).await {
            Ok(true) => {
                debug!("{} already present at {:?}", artifact, dest);
                return FetchOutcome::AlreadyPresent;
            }
            Ok(false) => {}
            Err(e) => return FetchOutcome::Failed { reason: e.to_string() },
        }

        if dest.exists() {
            warn!("{} at {:?} fails checksum, replacing", artifact, dest);
            if let Err(e) = tokio::fs::remove_file(dest).await {
                return FetchOutcome::Failed {
                    reason: InstallerError::io(dest, e).to_string(),
                };
            }
        }

        if let Some(parent) = dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return FetchOutcome::Failed {
                    reason: InstallerError::io(parent, e).to_string(),
                };
            }
        }

        let temp = temp_path_for(dest);
        let mut last_error = None;

        for source in &sources {
            let attempt = match source {
                Source::Bundled(path) => self.copy_bundled(path, &temp, entry).await,
                Source::Url(url) => self.download(url, &temp, entry).await,
            };

            match attempt {
                Ok(Some(bytes)) => {
                    if let Err(e) = tokio::fs::rename(&temp, dest).await {
                        let _ = tokio::fs::remove_file(&temp).await;
                        return FetchOutcome::Failed {
                            reason: InstallerError::io(dest, e).to_string(),
                        };
                    }
                    debug!("Fetched {} from {} ({} bytes)", artifact, source.describe(), bytes);
                    return FetchOutcome::Fetched { bytes };
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tokio::fs::remove_file(&temp).await;
                    warn!("{} failed for {}: {}", source.describe(), artifact, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        let _ = tokio::fs::remove_file(&temp).await;
        FetchOutcome::Failed {
            reason: last_error.unwrap_or_else(|| "no download source available".to_string()),
        }
    }

    /// Stream one URL into `temp`, hashing as bytes arrive.
    async fn download(&self, url: &str, temp: &Path, entry: &LibraryEntry) -> InstallerResult<Option<u64>> {
        let mut body = self.transport.get(url).await?;
        let artifact = entry.artifact.to_string();
        let total = body.total.or(entry.size);
        let mut hasher = entry.checksum.as_ref().map(|c| c.hasher());
        let mut written = 0u64;

        // Scoped so the handle is closed before the rename
        {
            let mut file = tokio::fs::File::create(temp)
                .await
                .map_err(|e| InstallerError::io(temp, e))?;
            while let Some(chunk) = body.chunks.next().await {
                let chunk = chunk?;
                if let Some(h) = hasher.as_mut() {
                    h.update(&chunk);
                }
                file.write_all(&chunk)
                    .await
                    .map_err(|e| InstallerError::io(temp, e))?;
                written += chunk.len() as u64;
                self.sink.download_progress(&artifact, written, total);
            }
            file.flush().await.map_err(|e| InstallerError::io(temp, e))?;
        }

        verify(entry, hasher.map(|h| h.finalize_hex()))?;
        Ok(Some(written))
    }

    /// Copy a bundled artifact into `temp`. `Ok(None)` when the bundle
    /// does not ship it.
    async fn copy_bundled(&self, repository_path: &str, temp: &Path, entry: &LibraryEntry) -> InstallerResult<Option<u64>> {
        let Some(bundle) = self.bundle.clone() else {
            return Ok(None);
        };
        let path = repository_path.to_string();
        let bytes = tokio::task::spawn_blocking(move || bundle.read_artifact(&path))
            .await
            .map_err(|e| InstallerError::Other(format!("Task join error: {e}")))??;
        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let actual = entry.checksum.as_ref().map(|c| {
            let mut hasher = c.hasher();
            hasher.update(&bytes);
            hasher.finalize_hex()
        });
        verify(entry, actual)?;

        tokio::fs::write(temp, &bytes)
            .await
            .map_err(|e| InstallerError::io(temp, e))?;
        Ok(Some(bytes.len() as u64))
    }

    // ── Batch ───────────────────────────────────────────

    /// Fetch many entries with at most `concurrency` transfers in flight.
    ///
    /// Individual failures are collected, never raised.
    pub async fn fetch_all(&self, entries: &[&LibraryEntry], libraries_root: &Path) -> BatchReport {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );

        let total = entries.len();
        let mut completions = stream::iter(entries.iter().copied())
            .map(|entry| async move { (entry, self.fetch(entry, libraries_root).await) })
            .buffer_unordered(self.concurrency);

        let mut report = BatchReport::default();
        let mut done = 0usize;
        while let Some((entry, outcome)) = completions.next().await {
            done += 1;
            match outcome {
                FetchOutcome::AlreadyPresent => report.already_present += 1,
                FetchOutcome::Fetched { bytes } => {
                    report.fetched += 1;
                    report.bytes += bytes;
                    self.sink.message(&format!("Downloaded {}", entry.artifact));
                }
                FetchOutcome::Failed { reason } => {
                    self.sink.message(&format!("Failed to download {}: {}", entry.artifact, reason));
                    report.failures.push((entry.artifact.to_string(), reason));
                }
            }
            self.sink.progress(done as f64 / total as f64);
        }

        report.failures.sort();
        report
    }
}

fn verify(entry: &LibraryEntry, actual: Option<String>) -> InstallerResult<()> {
    match (&entry.checksum, actual) {
        (Some(expected), Some(actual)) if !expected.matches(&actual) => Err(InstallerError::DownloadFailed {
            artifact: entry.artifact.to_string(),
            reason: format!("checksum mismatch: expected {expected}, got {actual}"),
        }),
        _ => Ok(()),
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::testing::MemoryTransport;
    use crate::core::downloader::Checksum;
    use crate::core::maven::Artifact;
    use crate::core::profile::write_zip;
    use crate::core::progress::RecordingProgress;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn entry(coord: &str, checksum: Option<&str>, urls: &[&str]) -> LibraryEntry {
        LibraryEntry {
            artifact: Artifact::parse(coord).unwrap(),
            checksum: checksum.map(|c| Checksum::parse(c).unwrap()),
            size: None,
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn downloader(transport: Arc<MemoryTransport>) -> Downloader {
        Downloader::new(transport, Arc::new(RecordingProgress::default()))
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|rd| {
                rd.filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn second_fetch_is_already_present_without_network() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://repo/b-1.jar", b"hello"));
        let dl = downloader(transport.clone());
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://repo/b-1.jar"]);

        assert_eq!(dl.fetch(&lib, root.path()).await, FetchOutcome::Fetched { bytes: 5 });
        assert_eq!(dl.fetch(&lib, root.path()).await, FetchOutcome::AlreadyPresent);
        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(std::fs::read(root.path().join("a/b/1/b-1.jar")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn candidates_are_tried_in_order_until_one_verifies() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            MemoryTransport::default()
                .with("https://two/b-1.jar", b"corrupt")
                .with("https://three/b-1.jar", b"hello"),
        );
        let dl = downloader(transport.clone());
        let lib = entry(
            "a:b:1",
            Some(HELLO_SHA1),
            &["https://one/b-1.jar", "https://two/b-1.jar", "https://three/b-1.jar"],
        );

        assert_eq!(dl.fetch(&lib, root.path()).await, FetchOutcome::Fetched { bytes: 5 });
        assert_eq!(
            transport.attempts(),
            vec!["https://one/b-1.jar", "https://two/b-1.jar", "https://three/b-1.jar"]
        );
        assert_eq!(leftover_temp_files(&root.path().join("a/b/1")), 0);
    }

    #[tokio::test]
    async fn mirrors_follow_explicit_urls() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://mirror/a/b/1/b-1.jar", b"hello"));
        let dl = downloader(transport.clone()).with_mirrors(vec![Mirror {
            name: Some("Mirror".into()),
            url: "https://mirror".into(),
            homepage: None,
        }]);
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://primary/b-1.jar"]);

        assert!(matches!(dl.fetch(&lib, root.path()).await, FetchOutcome::Fetched { .. }));
        assert_eq!(
            transport.attempts(),
            vec!["https://primary/b-1.jar", "https://mirror/a/b/1/b-1.jar"]
        );
    }

    #[tokio::test]
    async fn mismatch_everywhere_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://repo/b-1.jar", b"corrupt"));
        let dl = downloader(transport);
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://repo/b-1.jar"]);

        let outcome = dl.fetch(&lib, root.path()).await;
        match outcome {
            FetchOutcome::Failed { reason } => assert!(reason.contains("checksum mismatch")),
            other => panic!("expected failure, got {other:?}"),
        }
        let dest = root.path().join("a/b/1/b-1.jar");
        assert!(!dest.exists());
        assert_eq!(leftover_temp_files(&root.path().join("a/b/1")), 0);
    }

    #[tokio::test]
    async fn corrupt_existing_file_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("a/b/1/b-1.jar");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"stale").unwrap();

        let transport = Arc::new(MemoryTransport::default().with("https://repo/b-1.jar", b"hello"));
        let dl = downloader(transport);
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://repo/b-1.jar"]);

        assert!(matches!(dl.fetch(&lib, root.path()).await, FetchOutcome::Fetched { .. }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn corrupt_existing_file_is_deleted_when_refetch_fails() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("a/b/1/b-1.jar");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"stale").unwrap();

        let dl = downloader(Arc::new(MemoryTransport::default()));
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://repo/b-1.jar"]);

        assert!(matches!(dl.fetch(&lib, root.path()).await, FetchOutcome::Failed { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unverified_entries_accept_any_bytes_and_any_existing_file() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://repo/b-1.jar", b"whatever"));
        let dl = downloader(transport.clone());
        let lib = entry("a:b:1", None, &["https://repo/b-1.jar"]);

        assert_eq!(dl.fetch(&lib, root.path()).await, FetchOutcome::Fetched { bytes: 8 });
        std::fs::write(root.path().join("a/b/1/b-1.jar"), b"changed locally").unwrap();
        assert_eq!(dl.fetch(&lib, root.path()).await, FetchOutcome::AlreadyPresent);
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test]
    async fn no_candidates_is_a_failure() {
        let root = tempfile::tempdir().unwrap();
        let dl = downloader(Arc::new(MemoryTransport::default()));
        let lib = entry("a:b:1", None, &[]);
        assert_eq!(
            dl.fetch(&lib, root.path()).await,
            FetchOutcome::Failed {
                reason: "no download source available".into()
            }
        );
    }

    #[tokio::test]
    async fn bundled_artifacts_are_used_before_network() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("installer.jar");
        write_zip(&archive, &[("maven/a/b/1/b-1.jar", b"hello")]);

        let transport = Arc::new(MemoryTransport::default());
        let dl = downloader(transport.clone()).with_bundle(Some(InstallerBundle::Archive(archive)));
        let libs = root.path().join("libraries");
        let lib = entry("a:b:1", Some(HELLO_SHA1), &["https://repo/b-1.jar"]);

        assert_eq!(dl.fetch(&lib, &libs).await, FetchOutcome::Fetched { bytes: 5 });
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn fetch_to_writes_an_explicit_destination() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://piston/client.jar", b"hello"));
        let dl = downloader(transport).with_mirrors(vec![Mirror {
            name: None,
            url: "https://mirror".into(),
            homepage: None,
        }]);
        let lib = entry("net.minecraft:client:1.20.1", Some(HELLO_SHA1), &["https://piston/client.jar"]);
        let dest = root.path().join("client.jar");

        assert!(matches!(dl.fetch_to(&lib, &dest).await, FetchOutcome::Fetched { .. }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn batch_collects_every_failure_sorted() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://repo/ok.jar", b"hello"));
        let dl = downloader(transport).with_concurrency(2);

        let ok = entry("m:ok:1", Some(HELLO_SHA1), &["https://repo/ok.jar"]);
        let bad_z = entry("z:bad:1", None, &["https://repo/z.jar"]);
        let bad_a = entry("a:bad:1", None, &["https://repo/a.jar"]);

        let report = dl.fetch_all(&[&bad_z, &ok, &bad_a], root.path()).await;
        assert_eq!(report.fetched, 1);
        assert_eq!(report.already_present, 0);
        assert_eq!(report.bytes, 5);
        assert_eq!(report.failed_coordinates(), vec!["a:bad:1", "z:bad:1"]);
    }
}
