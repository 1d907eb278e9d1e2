//! Build cache configuration
//!
//! Configuration is merged from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`)
//! 3. CLI flags
//!
//! Every field has a default, so an empty file is a valid configuration.

mod defaults;
mod merge;

pub use defaults::{DEFAULT_CACHE_DIR, DEFAULT_CONNECT_BACK, DEFAULT_TOOLCHAIN, DEFAULT_URL_SCHEME};
pub use merge::{deep_merge, merge_layers};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::build::{BuildSettings, CrossCompiler, CrossCompilerTable};
use crate::error::CacheError;

/// Settings consumed by the build cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildCacheConfig {
    /// Whether the artifact delivery surface is on. Builds are refused when off.
    pub delivery_enabled: bool,
    /// Default address clients dial back to.
    pub connect_back: String,
    /// Default server key fingerprint baked into clients.
    pub fingerprint: String,
    /// Version used when the source tree has no `git describe` output.
    pub embedded_version: String,
    pub cache_dir: PathBuf,
    /// Root of the project; the client package is `<project_root>/cmd/client`.
    pub project_root: PathBuf,
    /// Scheme of generated download URLs.
    pub url_scheme: String,
    /// Compiler binary.
    pub toolchain: String,
    #[serde(rename = "cross_compiler")]
    pub cross_compilers: Vec<CrossCompiler>,
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode defaults: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<ConfigError> for CacheError {
    fn from(e: ConfigError) -> Self {
        CacheError::Config(e.to_string())
    }
}

impl BuildCacheConfig {
    /// Merge defaults, the optional config file, and CLI overrides.
    pub fn load(path: Option<&Path>, overrides: toml::Table) -> Result<Self, ConfigError> {
        let mut layers = vec![toml::Value::try_from(Self::default())?];

        if let Some(path) = path {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            layers.push(toml::Value::Table(contents.parse::<toml::Table>()?));
        }

        layers.push(toml::Value::Table(overrides));

        let config: Self = merge_layers(layers).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file body on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url_scheme.is_empty() {
            return Err(invalid("url_scheme", "must not be empty"));
        }
        if self.toolchain.is_empty() {
            return Err(invalid("toolchain", "must not be empty"));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(invalid("cache_dir", "must not be empty"));
        }
        for (i, rule) in self.cross_compilers.iter().enumerate() {
            let field = format!("cross_compiler[{}]", i);
            if rule.target_os.is_empty() || rule.target_arch.is_empty() {
                return Err(invalid(&field, "target_os and target_arch are required"));
            }
            if rule.cc.is_empty() {
                return Err(invalid(&field, "cc is required"));
            }
        }
        Ok(())
    }

    /// Build orchestration settings derived from this config.
    ///
    /// `cache_dir` is passed separately because the store canonicalizes it.
    pub fn build_settings(&self, cache_dir: &Path) -> BuildSettings {
        BuildSettings {
            program: self.toolchain.clone(),
            project_root: self.project_root.clone(),
            cache_dir: cache_dir.to_path_buf(),
            default_connect_back: self.connect_back.clone(),
            default_fingerprint: self.fingerprint.clone(),
            cross_compilers: CrossCompilerTable::new(self.cross_compilers.clone()),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
