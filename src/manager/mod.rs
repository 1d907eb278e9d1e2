//! Build cache manager
//!
//! [`BuildCache`] is the single owner of the name → artifact map. It is
//! created once at startup and shared as `Arc<BuildCache>` with every
//! caller (operator commands, the download handler).
//!
//! ## Locking
//!
//! Two locks, always taken in this order:
//! - `build_gate`: held for the whole of a build, so at most one compiler
//!   runs at a time in the process. The name-collision check happens under
//!   it, which keeps two builds from claiming the same name.
//! - `entries`: the map itself. Builds take it for writing only to commit
//!   a finished record, so lookups never wait for a compiler. Eviction and
//!   lookups (which bump the hit counter) take it for writing; listing
//!   takes it for reading.
//!
//! A record becomes visible only once its artifact exists on disk.

mod completion;

pub use completion::CompletionIndex;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, info, warn};

use crate::build::{self, random_token, BuildRequest, Orchestrator, TOKEN_LEN};
use crate::catalog::TargetCatalog;
use crate::config::BuildCacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::record::ArtifactRecord;
use crate::store::{Snapshot, SnapshotStore, StoreError};
use crate::toolchain::Toolchain;

/// The build cache.
pub struct BuildCache {
    delivery_enabled: bool,
    url_scheme: String,
    embedded_version: String,
    project_root: PathBuf,
    catalog: TargetCatalog,
    store: SnapshotStore,
    orchestrator: Orchestrator,
    toolchain: Arc<dyn Toolchain>,
    completion: Arc<dyn CompletionIndex>,
    entries: RwLock<Snapshot>,
    build_gate: Mutex<()>,
}

impl BuildCache {
    /// Validate the environment, discover targets, and load the snapshot.
    ///
    /// Fails when the client source or cache directory is unusable or the
    /// toolchain cannot be queried. A bad snapshot is not an error.
    pub fn start(
        config: &BuildCacheConfig,
        toolchain: Arc<dyn Toolchain>,
        completion: Arc<dyn CompletionIndex>,
    ) -> CacheResult<Self> {
        config.validate()?;

        let store = SnapshotStore::prepare(&config.cache_dir, &build::client_source(&config.project_root))?;
        let catalog = TargetCatalog::discover(toolchain.as_ref())?;

        let entries = store.load();
        for key in entries.keys() {
            completion.add(key);
        }

        let orchestrator = Orchestrator::new(config.build_settings(store.dir()));

        info!(
            cache_dir = %store.dir().display(),
            entries = entries.len(),
            delivery_enabled = config.delivery_enabled,
            "build cache ready"
        );

        Ok(Self {
            delivery_enabled: config.delivery_enabled,
            url_scheme: config.url_scheme.clone(),
            embedded_version: config.embedded_version.clone(),
            project_root: config.project_root.clone(),
            catalog,
            store,
            orchestrator,
            toolchain,
            completion,
            entries: RwLock::new(entries),
            build_gate: Mutex::new(()),
        })
    }

    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// Absolute path of the cache directory.
    pub fn cache_dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.store.snapshot_path()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Compile a client and cache it under `request.name` (or a generated
    /// name). Returns the download URL.
    ///
    /// Blocks until the compiler exits, and blocks other builds meanwhile.
    /// On any failure the cache is left unchanged.
    pub fn build(&self, request: &BuildRequest) -> CacheResult<String> {
        if !self.delivery_enabled {
            return Err(CacheError::Disabled);
        }
        self.catalog.resolve(&request.os, &request.arch)?;

        let _gate = self.build_gate.lock().unwrap_or_else(PoisonError::into_inner);

        let name = if request.name.is_empty() {
            random_token(TOKEN_LEN)
        } else {
            request.name.clone()
        };
        if self.read_entries().contains_key(&name) {
            return Err(CacheError::NameCollision(name));
        }

        let version = self.source_version();
        let plan = self.orchestrator.assemble(&self.catalog, request, &version)?;
        info!(
            name = %name,
            target = %plan.target,
            kind = %plan.kind,
            path = %plan.invocation.output.display(),
            "building client"
        );

        if let Err(e) = self.orchestrator.execute(self.toolchain.as_ref(), &plan) {
            warn!(name = %name, target = %plan.target, error = %e, "build failed");
            remove_partial(&plan.invocation.output);
            return Err(e);
        }

        let mut entries = self.write_entries();
        entries.insert(name.clone(), plan.record());
        if let Err(e) = self.persist(&entries) {
            entries.remove(&name);
            remove_partial(&plan.invocation.output);
            return Err(e);
        }
        self.completion.add(&name);
        drop(entries);

        info!(name = %name, target = %plan.target, "build cached");
        Ok(format!("{}://{}/{}", self.url_scheme, plan.connect_back, name))
    }

    /// Look up an artifact and count the hit.
    ///
    /// The hit counter is only persisted by the next build or delete.
    pub fn get(&self, key: &str) -> CacheResult<ArtifactRecord> {
        let mut entries = self.write_entries();
        let record = entries
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        record.hit_count += 1;
        debug!(name = key, hits = record.hit_count, "cache hit");
        Ok(record.clone())
    }

    /// Records whose name, OS, or architecture match the glob `filter`.
    ///
    /// An empty filter returns everything. A malformed pattern is an error
    /// even when the cache is empty.
    pub fn list(&self, filter: &str) -> CacheResult<BTreeMap<String, ArtifactRecord>> {
        let matcher = compile_filter(filter)?;

        let entries = self.read_entries();
        let matching = entries
            .iter()
            .filter(|(name, record)| match &matcher {
                None => true,
                Some(m) => {
                    m.is_match(name.as_str())
                        || m.is_match(record.operating_system.as_str())
                        || m.is_match(record.architecture.as_str())
                }
            })
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect();
        Ok(matching)
    }

    /// Evict an artifact and delete its file.
    ///
    /// The entry is gone from the cache and the snapshot even when removing
    /// the file fails; that failure is still returned.
    pub fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.write_entries();
        let record = entries
            .remove(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), record);
            return Err(e);
        }
        self.completion.remove(key);
        info!(name = key, path = %record.path.display(), "evicted build");

        fs::remove_file(&record.path).map_err(|e| {
            warn!(name = key, path = %record.path.display(), error = %e, "unable to remove artifact");
            CacheError::Io(io::Error::new(
                e.kind(),
                format!("unable to remove {}: {}", record.path.display(), e),
            ))
        })
    }

    fn source_version(&self) -> String {
        self.toolchain
            .source_version(&self.project_root)
            .unwrap_or_else(|| format!("{} (guess)", self.embedded_version))
    }

    /// Write the snapshot. Only a serialization failure is returned; a
    /// failed write is logged and memory stays ahead of disk until the next
    /// successful write.
    ///
    /// A serialization failure does not abort the process: callers undo
    /// their change to `entries` and return `CacheError::Persistence`.
    fn persist(&self, entries: &Snapshot) -> CacheResult<()> {
        match self.store.save(entries) {
            Ok(()) => Ok(()),
            Err(StoreError::Write { path, source }) => {
                warn!(path = %path.display(), error = %source, "unable to write cache snapshot");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compile_filter(filter: &str) -> CacheResult<Option<GlobMatcher>> {
    if filter.is_empty() {
        return Ok(None);
    }
    let glob = GlobBuilder::new(&literal_braces(filter))
        .literal_separator(true)
        .build()?;
    Ok(Some(glob.compile_matcher()))
}

/// Rewrite `{` and `}` outside character classes as one-character classes,
/// so braces match themselves instead of starting an alternation.
fn literal_braces(filter: &str) -> String {
    let mut out = String::with_capacity(filter.len());
    let mut chars = filter.chars();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
                // a leading `]` or `!]` is part of the class
                let rest = chars.as_str();
                if let Some(stripped) = rest.strip_prefix("!]").or_else(|| rest.strip_prefix("^]")) {
                    out.push_str(&rest[..2]);
                    chars = stripped.chars();
                } else if let Some(stripped) = rest.strip_prefix(']') {
                    out.push(']');
                    chars = stripped.chars();
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '{' if !in_class => out.push_str("[{]"),
            '}' if !in_class => out.push_str("[}]"),
            _ => out.push(c),
        }
    }
    out
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "unable to remove partial artifact"),
    }
}
