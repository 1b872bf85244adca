pub mod artifacts;
pub mod source;

pub use artifacts::{Artifact, ArtifactStore};
pub use source::{FileSourceStorage, SourceRef, SourceStorage};
