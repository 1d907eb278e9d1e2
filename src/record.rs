//! Cached artifact metadata.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What kind of binary a build produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Executable,
    SharedObject,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Executable => "executable",
            ArtifactKind::SharedObject => "shared-object",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled client binary, keyed in the cache by its lookup name.
///
/// This is also the on-disk snapshot schema, so field names are part of
/// the durable format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Absolute path of the artifact. The file name is random and unrelated
    /// to the lookup name.
    pub path: PathBuf,
    pub operating_system: String,
    pub architecture: String,
    pub artifact_kind: ArtifactKind,
    /// Successful lookups since the record was created.
    #[serde(default)]
    pub hit_count: u64,
    /// `git describe` output, or "<version> (guess)".
    pub version: String,
}
