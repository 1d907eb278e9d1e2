//! Compilation target catalog
//!
//! The set of valid operating systems and architectures is not hard-coded:
//! it is read once from the toolchain's own target listing at startup and
//! never changes afterwards. Picking up a new toolchain's targets requires a
//! restart.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::{CacheError, CacheResult, TargetPart};
use crate::toolchain::{Target, Toolchain};

/// Targets the host toolchain can produce.
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    operating_systems: BTreeSet<String>,
    architectures: BTreeSet<String>,
    pairs: BTreeSet<Target>,
    host: Target,
}

impl TargetCatalog {
    /// Query the toolchain for its target matrix and host default.
    ///
    /// Failing to run the toolchain is fatal to startup.
    pub fn discover(toolchain: &dyn Toolchain) -> CacheResult<Self> {
        let listing = toolchain.list_targets().map_err(|e| {
            CacheError::Config(format!(
                "unable to run the compiler to get a list of compilation targets: {}",
                e
            ))
        })?;
        let host = toolchain.host_target().map_err(|e| {
            CacheError::Config(format!("unable to determine the host build target: {}", e))
        })?;

        let catalog = Self::from_listing(&listing, host);
        info!(
            targets = catalog.pairs.len(),
            operating_systems = catalog.operating_systems.len(),
            architectures = catalog.architectures.len(),
            host = %catalog.host,
            "discovered compilation targets"
        );
        Ok(catalog)
    }

    /// Build a catalog from `os/arch` lines. Lines that are not of that
    /// shape are ignored.
    pub fn from_listing(listing: &str, host: Target) -> Self {
        let mut catalog = Self {
            operating_systems: BTreeSet::new(),
            architectures: BTreeSet::new(),
            pairs: BTreeSet::new(),
            host,
        };

        for line in listing.lines() {
            match Target::parse(line) {
                Some(target) => {
                    catalog.operating_systems.insert(target.os.clone());
                    catalog.architectures.insert(target.arch.clone());
                    catalog.pairs.insert(target);
                }
                None if !line.trim().is_empty() => debug!(line, "skipping malformed target line"),
                None => {}
            }
        }

        catalog
    }

    pub fn is_valid_os(&self, os: &str) -> bool {
        self.operating_systems.contains(os)
    }

    pub fn is_valid_arch(&self, arch: &str) -> bool {
        self.architectures.contains(arch)
    }

    pub fn is_valid_pair(&self, target: &Target) -> bool {
        self.pairs.contains(target)
    }

    /// Default target when a request leaves OS or architecture empty.
    pub fn host(&self) -> &Target {
        &self.host
    }

    pub fn operating_systems(&self) -> impl Iterator<Item = &str> {
        self.operating_systems.iter().map(String::as_str)
    }

    pub fn architectures(&self) -> impl Iterator<Item = &str> {
        self.architectures.iter().map(String::as_str)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.pairs.iter()
    }

    /// Resolve a requested OS/architecture into a concrete target.
    ///
    /// Empty values take the host default and are not validated. Non-empty
    /// values must be known to the catalog; the OS is checked before the
    /// architecture. The resolved combination must also be a listed pair.
    pub fn resolve(&self, os: &str, arch: &str) -> CacheResult<Target> {
        if !os.is_empty() && !self.is_valid_os(os) {
            return Err(CacheError::invalid_os(os));
        }
        if !arch.is_empty() && !self.is_valid_arch(arch) {
            return Err(CacheError::invalid_arch(arch));
        }

        let target = Target::new(
            if os.is_empty() { self.host.os.as_str() } else { os },
            if arch.is_empty() { self.host.arch.as_str() } else { arch },
        );

        if (!os.is_empty() || !arch.is_empty()) && !self.is_valid_pair(&target) {
            return Err(CacheError::InvalidTarget {
                part: TargetPart::Pair,
                value: target.to_string(),
            });
        }

        Ok(target)
    }
}
