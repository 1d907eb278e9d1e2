//! Configurable mock toolchain.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::toolchain::{BuildInvocation, Target, ToolOutput, Toolchain};

/// Failure injection settings.
#[derive(Debug, Clone, Default)]
struct Failures {
    /// Listing the targets fails.
    listing: bool,
    /// Builds exit non-zero with this output.
    build_output: Option<String>,
    /// Builds cannot be spawned.
    spawn: bool,
}

/// Fake toolchain with scripted behaviour.
pub struct MockToolchain {
    listing: String,
    host: Target,
    version: Mutex<Option<String>>,
    failures: Mutex<Failures>,
    build_delay: Mutex<Option<Duration>>,
    invocations: Mutex<Vec<BuildInvocation>>,
    active_builds: AtomicUsize,
    peak_builds: AtomicUsize,
}

impl MockToolchain {
    /// Create a toolchain reporting `listing` (one `os/arch` per line) and `host`.
    pub fn new(listing: &str, host: Target) -> Self {
        Self {
            listing: listing.to_string(),
            host,
            version: Mutex::new(Some("v0.0.0-mock".to_string())),
            failures: Mutex::new(Failures::default()),
            build_delay: Mutex::new(None),
            invocations: Mutex::new(Vec::new()),
            active_builds: AtomicUsize::new(0),
            peak_builds: AtomicUsize::new(0),
        }
    }

    // === Test configuration ===

    /// Version reported by `source_version`; `None` simulates no git metadata.
    pub fn set_version(&self, version: Option<&str>) {
        *self.version.lock().unwrap() = version.map(str::to_string);
    }

    /// Make the target listing fail.
    pub fn fail_listing(&self) {
        self.failures.lock().unwrap().listing = true;
    }

    /// Make builds exit non-zero with `output`.
    pub fn fail_builds(&self, output: &str) {
        self.failures.lock().unwrap().build_output = Some(output.to_string());
    }

    /// Make builds fail to spawn.
    pub fn fail_spawn(&self) {
        self.failures.lock().unwrap().spawn = true;
    }

    /// Clear build failures.
    pub fn succeed_builds(&self) {
        let mut failures = self.failures.lock().unwrap();
        failures.build_output = None;
        failures.spawn = false;
    }

    /// Sleep this long inside every build.
    pub fn set_build_delay(&self, delay: Duration) {
        *self.build_delay.lock().unwrap() = Some(delay);
    }

    // === Inspection ===

    /// Every build invocation received, in order.
    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Highest number of builds that were running at the same time.
    pub fn peak_concurrent_builds(&self) -> usize {
        self.peak_builds.load(Ordering::SeqCst)
    }
}

impl Toolchain for MockToolchain {
    fn list_targets(&self) -> io::Result<String> {
        if self.failures.lock().unwrap().listing {
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock: go not found"));
        }
        Ok(self.listing.clone())
    }

    fn host_target(&self) -> io::Result<Target> {
        Ok(self.host.clone())
    }

    fn source_version(&self, _project_root: &Path) -> Option<String> {
        self.version.lock().unwrap().clone()
    }

    fn run(&self, invocation: &BuildInvocation) -> io::Result<ToolOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let failures = self.failures.lock().unwrap().clone();
        if failures.spawn {
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock: cannot spawn"));
        }

        let active = self.active_builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_builds.fetch_max(active, Ordering::SeqCst);

        let delay = *self.build_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let result = match failures.build_output {
            Some(output) => Ok(ToolOutput {
                success: false,
                code: Some(1),
                combined: output,
            }),
            None => fs::write(&invocation.output, b"\x7fELF mock artifact").map(|_| ToolOutput {
                success: true,
                code: Some(0),
                combined: String::new(),
            }),
        };

        self.active_builds.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn invocation(output: PathBuf) -> BuildInvocation {
        BuildInvocation {
            program: "go".to_string(),
            args: vec!["build".to_string()],
            env: vec![],
            output,
        }
    }

    #[test]
    fn test_mock_writes_artifact() {
        let temp = TempDir::new().unwrap();
        let mock = MockToolchain::new("linux/amd64", Target::new("linux", "amd64"));
        let out = temp.path().join("artifact");

        let result = mock.run(&invocation(out.clone())).unwrap();
        assert!(result.success);
        assert!(out.is_file());
        assert_eq!(mock.invocations().len(), 1);
        assert_eq!(mock.peak_concurrent_builds(), 1);
    }

    #[test]
    fn test_mock_failure_injection() {
        let temp = TempDir::new().unwrap();
        let mock = MockToolchain::new("linux/amd64", Target::new("linux", "amd64"));
        mock.fail_builds("boom");

        let result = mock.run(&invocation(temp.path().join("a"))).unwrap();
        assert!(!result.success);
        assert_eq!(result.combined, "boom");

        mock.fail_spawn();
        assert!(mock.run(&invocation(temp.path().join("b"))).is_err());

        mock.succeed_builds();
        assert!(mock.run(&invocation(temp.path().join("c"))).unwrap().success);
    }

    #[test]
    fn test_mock_listing_failure() {
        let mock = MockToolchain::new("linux/amd64", Target::new("linux", "amd64"));
        assert!(mock.list_targets().is_ok());
        mock.fail_listing();
        assert!(mock.list_targets().is_err());
    }
}
