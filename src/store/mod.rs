pub mod files;
pub mod sink;

use std::path::PathBuf;

/// Destinations of the two output artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub messages: PathBuf,
    pub mailbox_list: PathBuf,
}
