use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer.
/// Every module returns `Result<T, InstallerError>`.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── Target ──────────────────────────────────────────
    #[error("Invalid install target {path:?}: {message}")]
    InvalidTarget { path: PathBuf, message: String },

    // ── Manifest ────────────────────────────────────────
    #[error("Malformed artifact coordinate: {0}")]
    MalformedCoordinate(String),

    #[error("Invalid install profile: {0}")]
    InvalidManifest(String),

    #[error("Unknown optional library: {0}")]
    UnknownOptional(String),

    #[error("Failed to write version descriptor {path:?}: {message}")]
    ManifestWriteFailed { path: PathBuf, message: String },

    #[error("Remote version manifest unusable: {0}")]
    RemoteManifest(String),

    // ── Downloads ───────────────────────────────────────
    #[error("Download failed for {artifact}: {reason}")]
    DownloadFailed { artifact: String, reason: String },

    #[error("{} libraries failed to download. Try again.\n{}", failed.len(), failed.join("\n"))]
    LibraryDownloadFailed { failed: Vec<String> },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    // ── Processors ──────────────────────────────────────
    #[error("Processor {step} failed (code {code:?})\n{output}")]
    ProcessorFailed {
        step: String,
        code: Option<i32>,
        output: String,
    },

    // ── Control ─────────────────────────────────────────
    #[error("Installation cancelled")]
    Cancelled,

    // ── IO / formats ────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallerResult<T> = Result<T, InstallerError>;

impl InstallerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(source: std::io::Error) -> Self {
        InstallerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
