//! Built-in defaults (layer 1).

use std::path::PathBuf;

use super::BuildCacheConfig;
use crate::build::default_cross_compilers;

/// Connect-back address baked into clients when neither config nor the
/// operator supplies one.
pub const DEFAULT_CONNECT_BACK: &str = "localhost:2200";

pub const DEFAULT_CACHE_DIR: &str = "cache";

pub const DEFAULT_URL_SCHEME: &str = "http";

pub const DEFAULT_TOOLCHAIN: &str = "go";

impl Default for BuildCacheConfig {
    fn default() -> Self {
        Self {
            delivery_enabled: true,
            connect_back: DEFAULT_CONNECT_BACK.to_string(),
            fingerprint: String::new(),
            embedded_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            project_root: PathBuf::from("."),
            url_scheme: DEFAULT_URL_SCHEME.to_string(),
            toolchain: DEFAULT_TOOLCHAIN.to_string(),
            cross_compilers: default_cross_compilers(),
        }
    }
}
