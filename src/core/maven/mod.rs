mod artifact;
mod locator;

pub use artifact::Artifact;
pub use locator::ArtifactLocator;

/// Repository recorded for injected libraries that name none.
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
