//! Shared harness for build cache integration tests.
//!
//! Lays out a throwaway project tree with a `cmd/client` package and an
//! empty cache directory, and starts a [`BuildCache`] against a
//! [`MockToolchain`].

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rssh_buildcache::mock::MockToolchain;
use rssh_buildcache::{BuildCache, BuildCacheConfig, CacheResult, Target};
use rssh_trie::Trie;
use tempfile::TempDir;

/// Target listing used unless a test says otherwise.
pub const LISTING: &str = "linux/amd64\nlinux/arm64\nwindows/amd64\nwindows/386\n";

pub struct Harness {
    pub temp: TempDir,
    pub config: BuildCacheConfig,
    pub toolchain: Arc<MockToolchain>,
    pub trie: Arc<Trie>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_listing(LISTING)
    }

    pub fn with_listing(listing: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let project_root = temp.path().join("project");
        fs::create_dir_all(project_root.join("cmd/client")).unwrap();

        let config = BuildCacheConfig {
            connect_back: "server.example:2200".to_string(),
            fingerprint: "f00dfeed".to_string(),
            embedded_version: "1.4.0".to_string(),
            cache_dir: temp.path().join("cache"),
            project_root,
            ..BuildCacheConfig::default()
        };

        Self {
            temp,
            config,
            toolchain: Arc::new(MockToolchain::new(listing, Target::new("linux", "amd64"))),
            trie: Arc::new(Trie::new()),
        }
    }

    /// Start a cache. Call again to simulate a restart; each start gets a
    /// fresh completion index.
    pub fn start(&mut self) -> CacheResult<BuildCache> {
        self.trie = Arc::new(Trie::new());
        BuildCache::start(&self.config, self.toolchain.clone(), self.trie.clone())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache_dir.clone()
    }

    /// Names of files in the cache directory other than the snapshot.
    pub fn artifact_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != rssh_buildcache::SNAPSHOT_FILENAME)
            .collect();
        names.sort();
        names
    }
}
