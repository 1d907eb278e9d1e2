//! The Go toolchain, driven through its command line.

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{BuildInvocation, Target, ToolOutput, Toolchain};

/// Spawns the `go` binary (and `git` for version descriptions).
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoToolchain {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Toolchain for GoToolchain {
    fn list_targets(&self) -> io::Result<String> {
        run_command(&self.program, &["tool", "dist", "list"], None)
    }

    fn host_target(&self) -> io::Result<Target> {
        let output = run_command(&self.program, &["env", "GOOS", "GOARCH"], None)?;
        let mut lines = output.lines().map(str::trim);
        match (lines.next(), lines.next()) {
            (Some(os), Some(arch)) if !os.is_empty() && !arch.is_empty() => {
                Ok(Target::new(os, arch))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected `{} env` output: {:?}", self.program, output),
            )),
        }
    }

    fn source_version(&self, project_root: &Path) -> Option<String> {
        run_command("git", &["describe", "--tags"], Some(project_root))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn run(&self, invocation: &BuildInvocation) -> io::Result<ToolOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            combined,
        })
    }
}

/// Run a command and return its stdout, failing on non-zero exit.
fn run_command(cmd: &str, args: &[&str], cwd: Option<&Path>) -> io::Result<String> {
    debug!(cmd, ?args, "running toolchain command");
    let mut command = Command::new(cmd);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command.output()?;

    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "`{} {}` failed with exit code {:?}: {}",
                cmd,
                args.join(" "),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }
}
