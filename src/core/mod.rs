// ─── Installer Core ───
// Reconciles an install profile against a target directory.
//
// Architecture:
//   core/
//     maven/      Artifact coordinates + locator (paths, candidate URLs)
//     profile/    Install manifest model, loading, version descriptor
//     downloader/ Checksum-verified, mirror-aware downloads
//     install/    Per-side installation state machine
//     processors/ Sequential post-install tool pipeline
//     progress/   Progress sink + cancellation token
//     settings/   User configuration

pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod maven;
pub mod processors;
pub mod profile;
pub mod progress;
pub mod settings;
