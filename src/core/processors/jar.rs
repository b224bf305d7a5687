use std::io::Read;
use std::path::Path;

use crate::core::error::{InstallerError, InstallerResult};

/// `Main-Class` attribute of a JAR's `META-INF/MANIFEST.MF`, honouring
/// continuation lines.
pub fn read_main_class(path: &Path) -> InstallerResult<String> {
    let file = std::fs::File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut manifest = archive.by_name("META-INF/MANIFEST.MF").map_err(|e| {
        InstallerError::InvalidManifest(format!("Manifest not found in {}: {}", path.display(), e))
    })?;

    let mut text = String::new();
    manifest.read_to_string(&mut text)?;

    parse_main_class(&text).ok_or_else(|| {
        InstallerError::InvalidManifest(format!(
            "Main-Class missing in processor jar {}",
            path.display()
        ))
    })
}

fn parse_main_class(manifest: &str) -> Option<String> {
    let mut main_class: Option<String> = None;
    let mut current_key: Option<&str> = None;

    for line in manifest.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            current_key = Some(key);
            if key == "Main-Class" {
                main_class = Some(value.trim().to_string());
            }
        }
    }

    main_class.filter(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::write_zip;

    #[test]
    fn continuation_lines_are_joined() {
        let text = "Manifest-Version: 1.0\nMain-Class: net.example.tools.Very\n LongMain\nCreated-By: test\n";
        assert_eq!(
            parse_main_class(text).as_deref(),
            Some("net.example.tools.VeryLongMain")
        );
    }

    #[test]
    fn reads_attribute_from_jar() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("tool.jar");
        write_zip(
            &jar,
            &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\nMain-Class: net.example.Main\r\n")],
        );
        assert_eq!(read_main_class(&jar).unwrap(), "net.example.Main");
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_zip(&jar, &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n")]);
        assert!(matches!(
            read_main_class(&jar),
            Err(InstallerError::InvalidManifest(_))
        ));
    }
}
