//! Build orchestration
//!
//! Turns a validated build request into a concrete compiler invocation and
//! runs it:
//! - target resolution against the [`TargetCatalog`] (empty = host default)
//! - connect-back address and fingerprint defaults
//! - a random artifact file name under the cache directory
//! - shared-object builds (`.so`/`.dll`, cgo on, optional cross `CC`)
//! - stripped binaries with the address, fingerprint and version injected
//!   at link time

mod cross;

pub use cross::{default_cross_compilers, CrossCompiler, CrossCompilerTable};

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::catalog::TargetCatalog;
use crate::error::{CacheError, CacheResult};
use crate::record::{ArtifactKind, ArtifactRecord};
use crate::toolchain::{BuildInvocation, Target, Toolchain};

/// Length of generated artifact file names and lookup keys.
pub const TOKEN_LEN: usize = 16;

/// Location of the client package relative to the project root.
pub const CLIENT_SOURCE: &str = "cmd/client";

/// Generate a random alphanumeric token.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Parameters of a build as supplied by an operator. Empty strings mean
/// "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub os: String,
    pub arch: String,
    pub connect_back: String,
    pub fingerprint: String,
    /// Lookup key; generated when empty.
    pub name: String,
    pub shared: bool,
}

/// Static inputs of every build.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Compiler binary, e.g. `go`.
    pub program: String,
    pub project_root: PathBuf,
    pub cache_dir: PathBuf,
    pub default_connect_back: String,
    pub default_fingerprint: String,
    pub cross_compilers: CrossCompilerTable,
}

/// An assembled build, ready to execute.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub invocation: BuildInvocation,
    pub target: Target,
    pub kind: ArtifactKind,
    /// Resolved connect-back address (used for the delivery URL).
    pub connect_back: String,
    pub fingerprint: String,
    pub version: String,
}

impl BuildPlan {
    /// The record to cache once this plan has executed successfully.
    pub fn record(&self) -> ArtifactRecord {
        ArtifactRecord {
            path: self.invocation.output.clone(),
            operating_system: self.target.os.clone(),
            architecture: self.target.arch.clone(),
            artifact_kind: self.kind,
            hit_count: 0,
            version: self.version.clone(),
        }
    }
}

/// Assembles and runs compiler invocations.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    settings: BuildSettings,
}

impl Orchestrator {
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Directory holding the client package that gets compiled.
    pub fn client_source(&self) -> PathBuf {
        client_source(&self.settings.project_root)
    }

    /// Build the invocation for `request`.
    ///
    /// Fails only on target validation; nothing is spawned here.
    pub fn assemble(
        &self,
        catalog: &TargetCatalog,
        request: &BuildRequest,
        version: &str,
    ) -> CacheResult<BuildPlan> {
        let target = catalog.resolve(&request.os, &request.arch)?;

        let connect_back = non_empty_or(&request.connect_back, &self.settings.default_connect_back);
        let fingerprint = non_empty_or(&request.fingerprint, &self.settings.default_fingerprint);

        let mut output = self.settings.cache_dir.join(random_token(TOKEN_LEN));
        let kind = if request.shared {
            let ext = if target.os == "windows" { "dll" } else { "so" };
            output.set_extension(ext);
            ArtifactKind::SharedObject
        } else {
            ArtifactKind::Executable
        };

        let mut args = vec!["build".to_string()];
        if request.shared {
            args.push("-buildmode=c-shared".to_string());
            args.push("-tags=cshared".to_string());
        }
        args.push(ldflags(&connect_back, &fingerprint, version));
        args.push("-o".to_string());
        args.push(output.to_string_lossy().into_owned());
        args.push(self.client_source().to_string_lossy().into_owned());

        let mut env = vec![
            ("GOOS".to_string(), target.os.clone()),
            ("GOARCH".to_string(), target.arch.clone()),
        ];
        if request.shared {
            if let Some(cc) = self.settings.cross_compilers.select(catalog.host(), &target) {
                env.push(("CC".to_string(), cc.to_string()));
            }
            env.push(("CGO_ENABLED".to_string(), "1".to_string()));
        } else {
            env.push(("CGO_ENABLED".to_string(), "0".to_string()));
        }

        Ok(BuildPlan {
            invocation: BuildInvocation {
                program: self.settings.program.clone(),
                args,
                env,
                output,
            },
            target,
            kind,
            connect_back,
            fingerprint,
            version: version.to_string(),
        })
    }

    /// Run a plan. On success the artifact is made owner read/write only.
    ///
    /// There is no timeout: a hung compiler blocks the caller indefinitely.
    pub fn execute(&self, toolchain: &dyn Toolchain, plan: &BuildPlan) -> CacheResult<()> {
        let invocation = &plan.invocation;
        debug!(program = %invocation.program, args = ?invocation.args, env = ?invocation.env, "spawning build");

        let output = toolchain.run(invocation).map_err(|e| CacheError::BuildFailed {
            reason: format!("unable to start {}: {}", invocation.program, e),
            output: String::new(),
        })?;

        if !output.success {
            let reason = match output.code {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(CacheError::BuildFailed {
                reason,
                output: output.combined,
            });
        }

        if !invocation.output.is_file() {
            return Err(CacheError::BuildFailed {
                reason: format!(
                    "compiler reported success but {} was not written",
                    invocation.output.display()
                ),
                output: output.combined,
            });
        }

        if let Err(e) = restrict_permissions(&invocation.output) {
            warn!(path = %invocation.output.display(), error = %e, "unable to restrict artifact permissions");
        }

        Ok(())
    }
}

pub(crate) fn client_source(project_root: &Path) -> PathBuf {
    project_root.join(CLIENT_SOURCE)
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// `-ldflags` argument: strip symbols and inject the client's baked-in values.
fn ldflags(connect_back: &str, fingerprint: &str, version: &str) -> String {
    format!(
        "-ldflags=-s -w {} {} {}",
        link_value("main.destination", connect_back),
        link_value("main.fingerprint", fingerprint),
        link_value("client.Version", version),
    )
}

/// A `-X name=value` pair, quoted when the value would otherwise be split
/// by the linker's flag parser.
fn link_value(symbol: &str, value: &str) -> String {
    let assignment = format!("{}={}", symbol, value);
    if !assignment.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        format!("-X {}", assignment)
    } else if !assignment.contains('\'') {
        format!("-X '{}'", assignment)
    } else {
        format!("-X \"{}\"", assignment)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
