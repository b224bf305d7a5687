// ─── Installation ───
// Drives one side's install through its stages:
//
//   VALIDATING → EXTRACTING_MANIFEST → FETCHING_BASE_ARTIFACT
//     → RESOLVING_LIBRARIES → RUNNING_PROCESSORS → DONE
//
// Any stage may end in FAILED. Cancellation is observed only at stage
// boundaries and ends in CANCELLED; partial files stay on disk and the next
// run picks them up through the already-present fast path.

mod selection;
mod summary;
mod target;
mod vanilla;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::downloader::{Downloader, FetchOutcome, Transport};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::Artifact;
use crate::core::processors::{ProcessRunner, ProcessorPipeline, SystemRunner};
use crate::core::profile::{
    render_version_descriptor, InstallManifest, InstallerBundle, LibraryEntry, ManifestLibrary,
    ModListJson, ModListType, Side,
};
use crate::core::progress::{CancelToken, ProgressSink};
use crate::core::settings::InstallerSettings;

pub use selection::{IncludeOptional, OptionalSelection};
pub use summary::InstallSummary;
pub use target::LAUNCHER_PROFILES;
pub use vanilla::{VanillaDownload, VanillaResolver, VanillaVersion, VersionEntry, VersionManifest};

pub const LIBRARIES_DIR: &str = "libraries";
pub const MOD_LIST_FILE: &str = "mod_list.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Pending,
    Validating,
    ExtractingManifest,
    FetchingBaseArtifact,
    ResolvingLibraries,
    RunningProcessors,
    Done,
    Failed,
    Cancelled,
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Stage name announced on the progress channel.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Validating => "Validating target",
            Self::ExtractingManifest => "Extracting json",
            Self::FetchingBaseArtifact => "Fetching base artifact",
            Self::ResolvingLibraries => "Downloading libraries",
            Self::RunningProcessors => "Running processors",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One installation run for one side.
pub struct Installation {
    manifest: InstallManifest,
    side: Side,
    bundle: Option<InstallerBundle>,
    transport: Arc<dyn Transport>,
    runner: Arc<dyn ProcessRunner>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    settings: InstallerSettings,
    transitions: Mutex<Vec<InstallState>>,
}

impl Installation {
    pub fn new(
        manifest: InstallManifest,
        side: Side,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            manifest,
            side,
            bundle: None,
            transport,
            runner: Arc::new(SystemRunner),
            sink,
            cancel: CancelToken::new(),
            settings: InstallerSettings::default(),
            transitions: Mutex::new(vec![InstallState::Pending]),
        }
    }

    /// Bundle the manifest was loaded from; supplies bundled libraries and
    /// `/path` data files.
    pub fn with_bundle(mut self, bundle: Option<InstallerBundle>) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_settings(mut self, settings: InstallerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn manifest(&self) -> &InstallManifest {
        &self.manifest
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> InstallState {
        self.transitions().last().copied().unwrap_or(InstallState::Pending)
    }

    /// Every state entered so far, in order.
    pub fn transitions(&self) -> Vec<InstallState> {
        self.transitions.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Run the installation into `target`. Ends in `Done`, `Failed` or
    /// `Cancelled`; the error of a failed run is returned as-is.
    pub async fn run(&self, target: &Path, include: &dyn IncludeOptional) -> InstallerResult<InstallSummary> {
        info!(
            "Installing {} profile {} ({}) into {:?}",
            self.side, self.manifest.profile, self.manifest.version, target
        );
        if let Some(sponsor) = self.manifest.sponsor_message() {
            self.sink.message(&sponsor);
        }

        let result = self.drive(target, include).await;
        match &result {
            Ok(summary) => {
                self.record(InstallState::Done);
                self.sink.message(&summary.message());
                info!(
                    "{} ({} bytes in {}s)",
                    summary.message(),
                    summary.bytes,
                    summary.elapsed().num_seconds()
                );
            }
            Err(InstallerError::Cancelled) => {
                self.record(InstallState::Cancelled);
                self.sink.message("Installation cancelled");
                info!("Installation cancelled in {:?}", self.transitions());
            }
            Err(e) => {
                self.record(InstallState::Failed);
                self.sink.message(&e.to_string());
                warn!("Installation failed: {}", e);
            }
        }
        result
    }

    async fn drive(&self, target: &Path, include: &dyn IncludeOptional) -> InstallerResult<InstallSummary> {
        let started_at = Utc::now();

        self.enter(InstallState::Validating)?;
        target::validate_target(self.side, target)?;

        self.enter(InstallState::ExtractingManifest)?;
        let libraries_root = target.join(LIBRARIES_DIR);
        tokio::fs::create_dir_all(&libraries_root)
            .await
            .map_err(|e| InstallerError::io(&libraries_root, e))?;
        let selected: Vec<&ManifestLibrary> = self
            .manifest
            .optionals()
            .filter(|l| include.include(l.artifact()))
            .collect();
        let mod_list = self.mod_list_path(target);
        self.write_descriptor(target, &selected, mod_list.as_deref())
            .await?;

        self.enter(InstallState::FetchingBaseArtifact)?;
        let base_artifact = self.fetch_base_artifact(target).await?;

        self.enter(InstallState::ResolvingLibraries)?;
        let downloader = Downloader::new(self.transport.clone(), self.sink.clone())
            .with_concurrency(self.settings.concurrency)
            .with_mirrors(self.manifest.mirrors.clone())
            .with_bundle(self.bundle.clone());
        let working_set: Vec<&LibraryEntry> = self
            .manifest
            .required()
            .chain(selected.iter().copied())
            .map(|l| &l.entry)
            .collect();
        debug!(
            "Working set: {} libraries ({} optional)",
            working_set.len(),
            selected.len()
        );
        let report = downloader.fetch_all(&working_set, &libraries_root).await;
        if !report.failures.is_empty() {
            return Err(InstallerError::LibraryDownloadFailed {
                failed: report.failed_coordinates(),
            });
        }
        if let Some(path) = &mod_list {
            self.write_mod_list(path, &libraries_root, &selected).await;
        }

        self.enter(InstallState::RunningProcessors)?;
        let pipeline = ProcessorPipeline::new(
            &self.manifest,
            self.side,
            target,
            self.runner.clone(),
            self.sink.clone(),
        )
        .with_java(self.settings.java_path.clone())
        .with_bundle(self.bundle.clone());
        debug!("{} processors apply to {}", pipeline.len(), self.side);
        let processors = pipeline.process(&libraries_root, &base_artifact).await?;

        self.check_cancelled()?;
        Ok(InstallSummary {
            side: self.side,
            profile: self.manifest.profile.clone(),
            version: self.manifest.version.clone(),
            fetched: report.fetched,
            already_present: report.already_present,
            bytes: report.bytes,
            processors_ran: processors.ran,
            processors_skipped: processors.skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn enter(&self, state: InstallState) -> InstallerResult<()> {
        self.check_cancelled()?;
        self.record(state);
        self.sink.stage(state.label());
        info!("Stage: {}", state);
        Ok(())
    }

    fn check_cancelled(&self) -> InstallerResult<()> {
        if self.cancel.is_cancelled() {
            Err(InstallerError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn record(&self, state: InstallState) {
        if let Ok(mut transitions) = self.transitions.lock() {
            transitions.push(state);
        }
    }

    fn mod_list_path(&self, target: &Path) -> Option<PathBuf> {
        match self.manifest.mod_list {
            ModListType::None => None,
            ModListType::Relative => Some(target.join("mods").join(MOD_LIST_FILE)),
            ModListType::Absolute => Some(target.join(MOD_LIST_FILE)),
        }
    }

    /// `<target>/<version>.json`, rendered in full and written once.
    async fn write_descriptor(
        &self,
        target: &Path,
        selected: &[&ManifestLibrary],
        mod_list: Option<&Path>,
    ) -> InstallerResult<()> {
        let path = target.join(format!("{}.json", self.manifest.version));
        let write_failed = |message: String| InstallerError::ManifestWriteFailed {
            path: path.clone(),
            message,
        };

        let base = self
            .manifest
            .version_descriptor
            .as_ref()
            .ok_or_else(|| write_failed("the installer does not contain a version descriptor".into()))?;

        let injected: Vec<&ManifestLibrary> = selected
            .iter()
            .copied()
            .filter(|l| l.optional_info().is_some_and(|i| i.inject))
            .collect();
        let modlist_arg = mod_list.filter(|_| self.manifest.mod_list == ModListType::Absolute);
        let document = render_version_descriptor(base, &injected, modlist_arg)?;

        let text = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&path, text).await.map_err(|e| {
            write_failed(format!(
                "There was a problem writing the launcher version data, is it write protected? ({e})"
            ))
        })?;
        debug!("Wrote version descriptor {:?}", path);
        Ok(())
    }

    /// Resolve and fetch the side's base artifact unless it is already there.
    async fn fetch_base_artifact(&self, target: &Path) -> InstallerResult<PathBuf> {
        let path = self.side.base_artifact_path(target, &self.manifest.minecraft);
        if path.exists() {
            debug!("Base artifact present at {:?}", path);
            return Ok(path);
        }

        let download = match self.manifest.base_downloads.get(&self.side) {
            Some(direct) => direct.clone(),
            None => {
                let cache = target.join(format!("{}.json", self.side));
                VanillaResolver::new(self.transport.clone(), &self.settings.version_manifest_url)
                    .resolve(&self.manifest.minecraft, self.side, &cache)
                    .await?
            }
        };

        let artifact = Artifact::parse(&format!("net.minecraft:{}:{}", self.side, self.manifest.minecraft))?;
        let entry = LibraryEntry {
            artifact,
            checksum: download.checksum,
            size: download.size,
            urls: vec![download.url],
        };

        let downloader = Downloader::new(self.transport.clone(), self.sink.clone());
        match downloader.fetch_to(&entry, &path).await {
            FetchOutcome::AlreadyPresent | FetchOutcome::Fetched { .. } => Ok(path),
            FetchOutcome::Failed { reason } => Err(InstallerError::DownloadFailed {
                artifact: entry.artifact.to_string(),
                reason: format!(
                    "{reason}\nTry again, or use the vanilla launcher to install the vanilla version."
                ),
            }),
        }
    }

    /// Failure here leaves optional mods unlisted but does not fail the run.
    async fn write_mod_list(&self, path: &Path, libraries_root: &Path, selected: &[&ManifestLibrary]) {
        let mods: Vec<&ManifestLibrary> = selected
            .iter()
            .copied()
            .filter(|l| l.optional_info().is_some_and(|i| i.is_mod))
            .collect();
        let list = ModListJson::new(libraries_root, &mods);

        let result = write_json(path, &list).await;
        if let Err(e) = result {
            warn!("Failed to write {:?}: {}", path, e);
            self.sink
                .message("Failed to write mod_list.json, optional mods may not be loaded.");
        }
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    tokio::fs::write(path, text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::testing::MemoryTransport;
    use crate::core::downloader::Checksum;
    use crate::core::processors::testing::RecordingRunner;
    use crate::core::profile::{DirectDownload, LibraryKind, OptionalInfo, ProcessorStep, RunCondition};
    use crate::core::progress::RecordingProgress;
    use serde_json::json;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const WORLD_SHA1: &str = "7c211433f02071597741e6ff5a8ea34789abbf43";

    fn library(coord: &str, checksum: &str, url: &str) -> ManifestLibrary {
        ManifestLibrary {
            entry: LibraryEntry {
                artifact: Artifact::parse(coord).unwrap(),
                checksum: Some(Checksum::parse(checksum).unwrap()),
                size: None,
                urls: vec![url.to_string()],
            },
            kind: LibraryKind::Required,
        }
    }

    fn manifest(libraries: Vec<ManifestLibrary>, processors: Vec<ProcessorStep>) -> InstallManifest {
        let mut m = InstallManifest::new(
            "forge".into(),
            "1.20.1-forge-47.2.0".into(),
            "1.20.1".into(),
            libraries,
        )
        .unwrap();
        m.processors = processors;
        m.version_descriptor = Some(json!({
            "id": "1.20.1-forge-47.2.0",
            "minecraftArguments": "--tweak",
            "libraries": []
        }));
        m.base_downloads.insert(
            Side::Client,
            DirectDownload {
                url: "https://piston/client.jar".into(),
                checksum: None,
                size: None,
            },
        );
        m
    }

    fn client_target() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LAUNCHER_PROFILES), "{}").unwrap();
        std::fs::write(dir.path().join("client.jar"), b"vanilla").unwrap();
        dir
    }

    fn place(root: &Path, coord: &str, bytes: &[u8]) -> PathBuf {
        let path = root
            .join(LIBRARIES_DIR)
            .join(Artifact::parse(coord).unwrap().local_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn none() -> OptionalSelection {
        OptionalSelection::none()
    }

    #[tokio::test]
    async fn completes_with_one_fetch_and_one_processor() {
        let target = client_target();
        place(target.path(), "a:present:1", b"hello");
        let tool = place(target.path(), "tools:patch:1@sh", b"#!/bin/sh\n");

        let m = manifest(
            vec![
                library("a:present:1", HELLO_SHA1, "https://repo/present-1.jar"),
                library("a:absent:1", WORLD_SHA1, "https://repo/absent-1.jar"),
            ],
            vec![ProcessorStep {
                jar: Artifact::parse("tools:patch:1@sh").unwrap(),
                classpath: vec![],
                args: vec!["{MINECRAFT_JAR}".into()],
                sides: None,
                condition: RunCondition::Always,
            }],
        );
        let transport = Arc::new(MemoryTransport::default().with("https://repo/absent-1.jar", b"world"));
        let runner = Arc::new(RecordingRunner::default());
        let sink = Arc::new(RecordingProgress::default());

        let install = Installation::new(m, Side::Client, transport.clone(), sink.clone()).with_runner(runner.clone());
        let summary = install.run(target.path(), &none()).await.unwrap();

        assert_eq!(install.state(), InstallState::Done);
        assert!(install.state().is_terminal());
        assert_eq!(transport.attempts(), vec!["https://repo/absent-1.jar"]);
        assert_eq!(runner.programs(), vec![tool]);
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.already_present, 1);
        assert!(summary.message().contains("1 library downloaded"));
        assert_eq!(
            install.transitions(),
            vec![
                InstallState::Pending,
                InstallState::Validating,
                InstallState::ExtractingManifest,
                InstallState::FetchingBaseArtifact,
                InstallState::ResolvingLibraries,
                InstallState::RunningProcessors,
                InstallState::Done,
            ]
        );
        assert!(target.path().join("1.20.1-forge-47.2.0.json").exists());
        assert_eq!(
            sink.stages(),
            vec![
                "Validating target",
                "Extracting json",
                "Fetching base artifact",
                "Downloading libraries",
                "Running processors",
            ]
        );
        assert!(sink.messages().iter().any(|m| m.contains("1 library downloaded")));
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_with_the_coordinate() {
        let target = client_target();
        let m = manifest(vec![library("a:bad:1", HELLO_SHA1, "https://repo/bad-1.jar")], vec![]);
        let transport = Arc::new(MemoryTransport::default().with("https://repo/bad-1.jar", b"corrupt"));
        let install = Installation::new(m, Side::Client, transport, Arc::new(RecordingProgress::default()));

        let err = install.run(target.path(), &none()).await.unwrap_err();
        match err {
            InstallerError::LibraryDownloadFailed { failed } => assert_eq!(failed, vec!["a:bad:1"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(install.state(), InstallState::Failed);
        assert!(!target.path().join("libraries/a/bad/1/bad-1.jar").exists());
    }

    /// Requests cancellation as soon as a given stage starts.
    struct CancelOnStage {
        stage: &'static str,
        token: CancelToken,
    }

    impl ProgressSink for CancelOnStage {
        fn stage(&self, name: &str) {
            if name == self.stage {
                self.token.cancel();
            }
        }
        fn message(&self, _text: &str) {}
        fn progress(&self, _fraction: f64) {}
    }

    #[tokio::test]
    async fn cancellation_before_libraries_fetches_nothing() {
        let target = client_target();
        let m = manifest(vec![library("a:lib:1", HELLO_SHA1, "https://repo/lib-1.jar")], vec![]);
        let transport = Arc::new(MemoryTransport::default().with("https://repo/lib-1.jar", b"hello"));
        let token = CancelToken::new();
        let sink = Arc::new(CancelOnStage {
            stage: InstallState::FetchingBaseArtifact.label(),
            token: token.clone(),
        });

        let install = Installation::new(m, Side::Client, transport.clone(), sink).with_cancel_token(token);
        let err = install.run(target.path(), &none()).await.unwrap_err();

        assert!(matches!(err, InstallerError::Cancelled));
        assert_eq!(install.state(), InstallState::Cancelled);
        assert!(!install.transitions().contains(&InstallState::ResolvingLibraries));
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn invalid_target_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(vec![], vec![]);
        let install = Installation::new(
            m,
            Side::Client,
            Arc::new(MemoryTransport::default()),
            Arc::new(RecordingProgress::default()),
        );

        let err = install.run(&dir.path().join("missing"), &none()).await.unwrap_err();
        assert!(matches!(err, InstallerError::InvalidTarget { .. }));
        assert_eq!(
            install.transitions(),
            vec![InstallState::Pending, InstallState::Validating, InstallState::Failed]
        );
    }

    #[tokio::test]
    async fn missing_descriptor_is_fatal() {
        let target = client_target();
        let mut m = manifest(vec![], vec![]);
        m.version_descriptor = None;
        let install = Installation::new(
            m,
            Side::Client,
            Arc::new(MemoryTransport::default()),
            Arc::new(RecordingProgress::default()),
        );

        let err = install.run(target.path(), &none()).await.unwrap_err();
        assert!(matches!(err, InstallerError::ManifestWriteFailed { .. }));
        assert!(!install.transitions().contains(&InstallState::FetchingBaseArtifact));
    }

    #[tokio::test]
    async fn base_artifact_is_fetched_when_absent() {
        let target = client_target();
        std::fs::remove_file(target.path().join("client.jar")).unwrap();
        let m = manifest(vec![], vec![]);
        let transport = Arc::new(MemoryTransport::default().with("https://piston/client.jar", b"vanilla"));
        let install = Installation::new(m, Side::Client, transport, Arc::new(RecordingProgress::default()));

        install.run(target.path(), &none()).await.unwrap();
        assert_eq!(std::fs::read(target.path().join("client.jar")).unwrap(), b"vanilla");
    }

    #[tokio::test]
    async fn base_artifact_failure_is_fatal() {
        let target = client_target();
        std::fs::remove_file(target.path().join("client.jar")).unwrap();
        let m = manifest(vec![library("a:lib:1", HELLO_SHA1, "https://repo/lib-1.jar")], vec![]);
        let transport = Arc::new(MemoryTransport::default());
        let install = Installation::new(m, Side::Client, transport.clone(), Arc::new(RecordingProgress::default()));

        let err = install.run(target.path(), &none()).await.unwrap_err();
        assert!(matches!(err, InstallerError::DownloadFailed { .. }));
        assert_eq!(transport.attempts(), vec!["https://piston/client.jar"]);
    }

    fn optional(coord: &str, url: &str) -> ManifestLibrary {
        ManifestLibrary {
            entry: LibraryEntry {
                artifact: Artifact::parse(coord).unwrap(),
                checksum: None,
                size: None,
                urls: vec![url.to_string()],
            },
            kind: LibraryKind::Optional(OptionalInfo {
                display_name: coord.into(),
                description: String::new(),
                default_enabled: false,
                inject: true,
                is_mod: true,
                maven: Some("https://maven.example".into()),
            }),
        }
    }

    #[tokio::test]
    async fn selected_optionals_are_injected_and_listed() {
        let target = client_target();
        let mut m = manifest(
            vec![
                optional("mods:wanted:1", "https://repo/wanted-1.jar"),
                optional("mods:skipped:1", "https://repo/skipped-1.jar"),
            ],
            vec![],
        );
        m.mod_list = ModListType::Absolute;
        let selection = OptionalSelection::from_names(&m, &["mods:wanted:1"]).unwrap();
        let transport = Arc::new(MemoryTransport::default().with("https://repo/wanted-1.jar", b"mod"));
        let install = Installation::new(m, Side::Client, transport.clone(), Arc::new(RecordingProgress::default()));

        install.run(target.path(), &selection).await.unwrap();
        assert_eq!(transport.attempts(), vec!["https://repo/wanted-1.jar"]);

        let descriptor: serde_json::Value = serde_json::from_slice(
            &std::fs::read(target.path().join("1.20.1-forge-47.2.0.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(descriptor["libraries"][0]["name"], "mods:wanted:1");
        assert!(descriptor["minecraftArguments"]
            .as_str()
            .unwrap()
            .contains("--modListFile \"absolute:"));

        let list: serde_json::Value =
            serde_json::from_slice(&std::fs::read(target.path().join(MOD_LIST_FILE)).unwrap()).unwrap();
        assert_eq!(list["modRef"], json!(["mods:wanted:1"]));
    }
}
