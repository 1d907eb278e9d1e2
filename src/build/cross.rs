//! Target to C cross-compiler table.
//!
//! Shared-object builds need cgo, and cgo needs a C compiler that can emit
//! code for the target. Only the combinations listed here get an explicit
//! `CC`; everything else uses whatever the host toolchain picks. This is not
//! a general cross-compiler resolver.

use serde::{Deserialize, Serialize};

use crate::toolchain::Target;

/// One cross-compiler rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossCompiler {
    /// Host OS this rule applies to. `None` matches any host whose OS
    /// differs from `target_os`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_os: Option<String>,
    /// Host architecture this rule applies to. `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_arch: Option<String>,
    pub target_os: String,
    pub target_arch: String,
    /// Compiler binary to export as `CC`.
    pub cc: String,
}

impl CrossCompiler {
    pub fn matches(&self, host: &Target, target: &Target) -> bool {
        if self.target_os != target.os || self.target_arch != target.arch {
            return false;
        }
        let host_os_ok = match &self.host_os {
            Some(os) => *os == host.os,
            None => host.os != target.os,
        };
        let host_arch_ok = self.host_arch.as_ref().map_or(true, |arch| *arch == host.arch);
        host_os_ok && host_arch_ok
    }
}

/// The built-in rule: mingw for Windows/amd64 DLLs from non-Windows amd64 hosts.
pub fn default_cross_compilers() -> Vec<CrossCompiler> {
    vec![CrossCompiler {
        host_os: None,
        host_arch: Some("amd64".to_string()),
        target_os: "windows".to_string(),
        target_arch: "amd64".to_string(),
        cc: "x86_64-w64-mingw32-gcc".to_string(),
    }]
}

/// Ordered rule list; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct CrossCompilerTable {
    rules: Vec<CrossCompiler>,
}

impl CrossCompilerTable {
    pub fn new(rules: Vec<CrossCompiler>) -> Self {
        Self { rules }
    }

    /// The `CC` to use when building for `target` on `host`, if any.
    pub fn select(&self, host: &Target, target: &Target) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(host, target))
            .map(|rule| rule.cc.as_str())
    }

    pub fn rules(&self) -> &[CrossCompiler] {
        &self.rules
    }
}
