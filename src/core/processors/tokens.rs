// ─── Token substitution ───
// `{NAME}` placeholders resolve against the merged token map; `\` escapes the
// next character. Unknown names are errors so a typo never reaches a tool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::Artifact;
use crate::core::profile::InstallerBundle;

pub type Tokens = BTreeMap<String, String>;

/// Directory under the target where `/path` data entries are extracted.
pub const DATA_DIR: &str = "installer-data";

pub fn substitute(template: &str, tokens: &Tokens) -> InstallerResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(InstallerError::InvalidManifest(format!(
                        "unterminated token in `{template}`"
                    )));
                }
                let value = tokens.get(&name).ok_or_else(|| {
                    InstallerError::InvalidManifest(format!("unknown token {{{name}}} in `{template}`"))
                })?;
                out.push_str(value);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// `[coordinate]` → local library path.
fn artifact_reference(value: &str, libraries_root: &Path) -> InstallerResult<Option<PathBuf>> {
    match value.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(coord) => Ok(Some(libraries_root.join(Artifact::parse(coord)?.local_path()))),
        None => Ok(None),
    }
}

/// Resolve one processor argument: a whole-argument `[coordinate]` becomes
/// a library path, anything else goes through `substitute`.
pub fn resolve_argument(arg: &str, tokens: &Tokens, libraries_root: &Path) -> InstallerResult<String> {
    if let Some(path) = artifact_reference(arg, libraries_root)? {
        return Ok(path.to_string_lossy().to_string());
    }
    substitute(arg, tokens)
}

/// Resolve a manifest data value into its token value.
///
/// `/path` entries are copied out of the installer bundle into `data_dir`;
/// this is the only form with a filesystem effect.
pub fn resolve_data_value(
    key: &str,
    value: &str,
    libraries_root: &Path,
    bundle: Option<&InstallerBundle>,
    data_dir: &Path,
) -> InstallerResult<String> {
    if let Some(path) = artifact_reference(value, libraries_root)? {
        return Ok(path.to_string_lossy().to_string());
    }

    if let Some(literal) = value.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Ok(literal.to_string());
    }

    if let Some(entry) = value.strip_prefix('/') {
        let bundle = bundle.ok_or_else(|| {
            InstallerError::InvalidManifest(format!(
                "data entry {key} refers to bundled file {value} but no installer bundle is available"
            ))
        })?;
        let bytes = bundle.read_entry(entry)?.ok_or_else(|| {
            InstallerError::InvalidManifest(format!("data entry {key}: {value} not found in installer"))
        })?;

        let dest = data_dir.join(entry);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
        }
        std::fs::write(&dest, bytes).map_err(|e| InstallerError::io(&dest, e))?;
        debug!("Extracted {} to {:?}", value, dest);
        return Ok(dest.to_string_lossy().to_string());
    }

    Ok(value.to_string())
}
