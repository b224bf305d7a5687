// ─── Version Descriptor ───
// Builds the complete `<version>.json` document and the optional
// `mod_list.json` in memory; each is serialized once.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};

use super::model::ManifestLibrary;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::FORGE_MAVEN;

/// Descriptor with accepted injected libraries appended to `libraries` and,
/// when given, a `--modListFile` argument pointing at `mod_list`.
pub fn render_version_descriptor(
    base: &Value,
    injected: &[&ManifestLibrary],
    mod_list: Option<&Path>,
) -> InstallerResult<Value> {
    let mut doc = base.clone();
    let obj = doc.as_object_mut().ok_or_else(|| {
        InstallerError::InvalidManifest("version descriptor is not a JSON object".into())
    })?;

    if !injected.is_empty() {
        let libraries = obj
            .entry("libraries")
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(list) = libraries.as_array_mut() else {
            return Err(InstallerError::InvalidManifest(
                "version descriptor `libraries` is not an array".into(),
            ));
        };
        for lib in injected {
            let maven = lib
                .optional_info()
                .and_then(|i| i.maven.as_deref())
                .unwrap_or(FORGE_MAVEN);
            list.push(json!({
                "name": lib.artifact().to_string(),
                "url": maven,
            }));
        }
    }

    if let Some(path) = mod_list {
        let reference = format!("absolute:{}", path.display());
        if let Some(Value::String(args)) = obj.get_mut("minecraftArguments") {
            args.push_str(&format!(" --modListFile \"{reference}\""));
        } else if let Some(Value::Array(game)) = obj
            .get_mut("arguments")
            .and_then(|a| a.get_mut("game"))
        {
            game.push(Value::String("--modListFile".into()));
            game.push(Value::String(reference));
        } else {
            obj.insert(
                "minecraftArguments".into(),
                Value::String(format!("--modListFile \"{reference}\"")),
            );
        }
    }

    Ok(doc)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModListJson {
    pub repository_root: String,
    pub mod_ref: Vec<String>,
}

impl ModListJson {
    pub fn new(libraries_root: &Path, mods: &[&ManifestLibrary]) -> Self {
        Self {
            repository_root: format!("absolute:{}", libraries_root.display()),
            mod_ref: mods.iter().map(|m| m.artifact().to_string()).collect(),
        }
    }
}
