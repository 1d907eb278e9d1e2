//! External compiler toolchain.
//!
//! Everything that spawns a process lives behind the [`Toolchain`] trait so
//! the cache can be driven by a fake in tests (see [`crate::mock`]).

mod go;

pub use go::GoToolchain;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An operating system / architecture pair in toolchain vocabulary
/// (e.g. `linux`/`amd64`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Parse a `os/arch` line as printed by the target listing.
    ///
    /// Returns `None` unless the line has exactly two non-empty parts.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().split('/');
        let os = parts.next()?;
        let arch = parts.next()?;
        if parts.next().is_some() || os.is_empty() || arch.is_empty() {
            return None;
        }
        Some(Self::new(os, arch))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// A fully assembled out-of-process build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    /// Program to run (e.g. `go`).
    pub program: String,
    pub args: Vec<String>,
    /// Overrides applied on top of the inherited process environment.
    pub env: Vec<(String, String)>,
    /// Where the artifact will be written.
    pub output: PathBuf,
}

impl BuildInvocation {
    /// Value of an environment override, if set.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of running a [`BuildInvocation`].
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// All of stdout, then all of stderr. The two streams are not interleaved.
    pub combined: String,
}

/// The compiler toolchain and source-control helpers the cache depends on.
pub trait Toolchain: Send + Sync {
    /// Raw target listing, one `os/arch` per line.
    fn list_targets(&self) -> io::Result<String>;

    /// Target produced when no OS/architecture is requested.
    fn host_target(&self) -> io::Result<Target>;

    /// Best-effort version description of the client source tree.
    fn source_version(&self, project_root: &Path) -> Option<String>;

    /// Run a build to completion.
    ///
    /// An `Err` means the process could not be started at all; a process
    /// that ran and failed is reported through [`ToolOutput::success`].
    fn run(&self, invocation: &BuildInvocation) -> io::Result<ToolOutput>;
}
