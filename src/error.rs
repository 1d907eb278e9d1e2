//! Error type shared by every build cache operation.

use std::fmt;
use std::io;

/// Result alias for build cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Which half of a target pair failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPart {
    OperatingSystem,
    Architecture,
    /// Both halves are known but the combination is not.
    Pair,
}

impl fmt::Display for TargetPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetPart::OperatingSystem => "GOOS",
            TargetPart::Architecture => "GOARCH",
            TargetPart::Pair => "GOOS/GOARCH pair",
        };
        f.write_str(s)
    }
}

/// Errors returned by the build cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The delivery surface is switched off, so there is nothing to build for.
    #[error("web server is not enabled")]
    Disabled,

    /// Startup or configuration problem (missing client source, unusable cache dir, bad config file).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{part} supplied is not valid: {value}")]
    InvalidTarget { part: TargetPart, value: String },

    #[error("filter is not well formed: {0}")]
    MalformedFilter(#[from] globset::Error),

    #[error("link name is already in use: {0}")]
    NameCollision(String),

    #[error("unable to find cache entry: {0}")]
    NotFound(String),

    /// The compiler exited unsuccessfully. `output` is its stdout followed by
    /// its stderr, each verbatim; lines of the two streams are not interleaved.
    #[error("build failed: {reason}\n{output}")]
    BuildFailed { reason: String, output: String },

    #[error("failed to persist cache snapshot: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    pub(crate) fn invalid_os(value: &str) -> Self {
        CacheError::InvalidTarget {
            part: TargetPart::OperatingSystem,
            value: value.to_string(),
        }
    }

    pub(crate) fn invalid_arch(value: &str) -> Self {
        CacheError::InvalidTarget {
            part: TargetPart::Architecture,
            value: value.to_string(),
        }
    }

    /// True for the "unknown key" failure of `get` and `delete`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_names_value() {
        let err = CacheError::invalid_os("darwin");
        assert_eq!(err.to_string(), "GOOS supplied is not valid: darwin");

        let err = CacheError::invalid_arch("sparc");
        assert_eq!(err.to_string(), "GOARCH supplied is not valid: sparc");
    }

    #[test]
    fn test_build_failed_carries_output() {
        let err = CacheError::BuildFailed {
            reason: "exit status 2".to_string(),
            output: "main.go:3: undefined: foo".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit status 2"));
        assert!(msg.ends_with("main.go:3: undefined: foo"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(CacheError::NotFound("x".into()).is_not_found());
        assert!(!CacheError::Disabled.is_not_found());
    }
}
