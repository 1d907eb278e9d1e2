//! RSSH Build Cache - on-demand client builds
//!
//! This crate compiles reverse-connection clients for a requested
//! OS/architecture on demand, caches the resulting binaries under
//! operator-chosen (or generated) names, and keeps a JSON snapshot of the
//! cache so it survives restarts.
//!
//! The entry point is [`BuildCache`]; the download handler and operator
//! commands share one instance through an `Arc`.

pub mod build;
pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod record;
pub mod store;
pub mod toolchain;

pub use build::{BuildRequest, CrossCompiler};
pub use catalog::TargetCatalog;
pub use config::{BuildCacheConfig, ConfigError};
pub use error::{CacheError, CacheResult, TargetPart};
pub use manager::{BuildCache, CompletionIndex};
pub use record::{ArtifactKind, ArtifactRecord};
pub use store::{SnapshotStore, SNAPSHOT_FILENAME};
pub use toolchain::{GoToolchain, Target, Toolchain};
