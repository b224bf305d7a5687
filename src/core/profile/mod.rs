mod descriptor;
mod model;
mod raw;
mod source;

pub use crate::core::downloader::Checksum;
pub use descriptor::{render_version_descriptor, ModListJson};
pub use model::{
    DataValue, DirectDownload, InstallManifest, LibraryEntry, LibraryKind, ManifestLibrary,
    Mirror, ModListType, OptionalInfo, ProcessorOutput, ProcessorStep, RunCondition, Side,
};
pub use raw::{InstallProfileJson, SUPPORTED_SPEC};
pub use source::{InstallerBundle, PROFILE_ENTRY};

#[cfg(test)]
pub(crate) use source::tests::write_zip;
