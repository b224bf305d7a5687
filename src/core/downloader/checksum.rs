use std::fmt;
use std::io::Read;
use std::path::Path;

use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::core::error::{InstallerError, InstallerResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Expected digest of an artifact, lowercase hex.
///
/// The algorithm is inferred from the digest length (40 hex chars for
/// SHA-1, 64 for SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Checksum {
    Sha1(String),
    Sha256(String),
}

impl Checksum {
    pub fn parse(hex_digest: &str) -> InstallerResult<Self> {
        let normalized = hex_digest.trim().to_ascii_lowercase();
        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InstallerError::InvalidManifest(format!(
                "checksum is not hex: {hex_digest}"
            )));
        }
        match normalized.len() {
            40 => Ok(Self::Sha1(normalized)),
            64 => Ok(Self::Sha256(normalized)),
            n => Err(InstallerError::InvalidManifest(format!(
                "checksum of unsupported length {n}: {hex_digest}"
            ))),
        }
    }

    /// Parses an optional manifest field; blank means "not verified".
    pub fn parse_optional(value: Option<&str>) -> InstallerResult<Option<Self>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => Self::parse(v).map(Some),
        }
    }

    pub fn hex(&self) -> &str {
        match self {
            Self::Sha1(h) | Self::Sha256(h) => h,
        }
    }

    pub fn hasher(&self) -> StreamHasher {
        match self {
            Self::Sha1(_) => StreamHasher::Sha1(Sha1::new()),
            Self::Sha256(_) => StreamHasher::Sha256(Sha256::new()),
        }
    }

    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex().eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1(h) => write!(f, "sha1:{h}"),
            Self::Sha256(h) => write!(f, "sha256:{h}"),
        }
    }
}

/// Incremental digest fed chunk by chunk while streaming.
pub enum StreamHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamHasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digest an on-disk file with the algorithm of `expected`.
pub fn digest_file(path: &Path, expected: &Checksum) -> InstallerResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut hasher = expected.hasher();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| InstallerError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize_hex())
}

/// Whether `path` exists and satisfies `expected` (any file does when no
/// checksum is given).
pub async fn file_satisfies(path: &Path, expected: Option<&Checksum>) -> InstallerResult<bool> {
    if !tokio::fs::try_exists(path)
        .await
        .map_err(|e| InstallerError::io(path, e))?
    {
        return Ok(false);
    }
    let Some(expected) = expected else {
        return Ok(true);
    };

    let owned = path.to_path_buf();
    let algorithm = expected.clone();
    let actual = tokio::task::spawn_blocking(move || digest_file(&owned, &algorithm))
        .await
        .map_err(|e| InstallerError::Other(format!("Task join error: {e}")))??;
    Ok(expected.matches(&actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha1("hello") / sha256("hello")
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn algorithm_follows_digest_length() {
        assert!(matches!(Checksum::parse(HELLO_SHA1).unwrap(), Checksum::Sha1(_)));
        assert!(matches!(Checksum::parse(HELLO_SHA256).unwrap(), Checksum::Sha256(_)));
        assert!(Checksum::parse("abc").is_err());
        assert!(Checksum::parse(&"z".repeat(40)).is_err());
    }

    #[test]
    fn blank_checksum_means_unverified() {
        assert_eq!(Checksum::parse_optional(None).unwrap(), None);
        assert_eq!(Checksum::parse_optional(Some("  ")).unwrap(), None);
    }

    #[test]
    fn uppercase_digest_is_normalized() {
        let c = Checksum::parse(&HELLO_SHA1.to_uppercase()).unwrap();
        assert_eq!(c.hex(), HELLO_SHA1);
    }

    #[test]
    fn streamed_digest_matches_known_values() {
        for expected in [HELLO_SHA1, HELLO_SHA256] {
            let checksum = Checksum::parse(expected).unwrap();
            let mut hasher = checksum.hasher();
            hasher.update(b"hel");
            hasher.update(b"lo");
            assert!(checksum.matches(&hasher.finalize_hex()));
        }
    }

    #[tokio::test]
    async fn file_satisfies_checks_presence_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let sha1 = Checksum::parse(HELLO_SHA1).unwrap();

        assert!(!file_satisfies(&path, None).await.unwrap());

        std::fs::write(&path, b"hello").unwrap();
        assert!(file_satisfies(&path, None).await.unwrap());
        assert!(file_satisfies(&path, Some(&sha1)).await.unwrap());

        std::fs::write(&path, b"tampered").unwrap();
        assert!(!file_satisfies(&path, Some(&sha1)).await.unwrap());
    }
}
