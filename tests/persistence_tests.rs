//! Snapshot persistence across restarts

mod fixtures;

use std::fs;

use fixtures::Harness;
use rssh_buildcache::{ArtifactKind, BuildRequest, SNAPSHOT_FILENAME};

fn named(os: &str, arch: &str, name: &str, shared: bool) -> BuildRequest {
    BuildRequest {
        os: os.to_string(),
        arch: arch.to_string(),
        name: name.to_string(),
        shared,
        ..Default::default()
    }
}

#[test]
fn test_restart_restores_all_records() {
    let mut h = Harness::new();
    let before = {
        let cache = h.start().unwrap();
        cache.build(&named("linux", "amd64", "a", false)).unwrap();
        cache.build(&named("windows", "amd64", "b", true)).unwrap();
        cache.build(&named("windows", "386", "c", false)).unwrap();
        cache.list("").unwrap()
    };

    let cache = h.start().unwrap();
    assert_eq!(cache.list("").unwrap(), before);
    assert_eq!(before["b"].artifact_kind, ArtifactKind::SharedObject);
}

#[test]
fn test_restart_repopulates_completion() {
    let mut h = Harness::new();
    {
        let cache = h.start().unwrap();
        cache.build(&named("", "", "first", false)).unwrap();
        cache.build(&named("", "", "second", false)).unwrap();
    }

    let _cache = h.start().unwrap();
    assert_eq!(h.trie.prefix_matches(""), vec!["first", "second"]);
}

#[test]
fn test_hits_persist_with_next_mutation() {
    let mut h = Harness::new();
    {
        let cache = h.start().unwrap();
        cache.build(&named("", "", "popular", false)).unwrap();
        cache.get("popular").unwrap();
        cache.get("popular").unwrap();
    }

    // lookups alone do not rewrite the snapshot
    {
        let cache = h.start().unwrap();
        assert_eq!(cache.list("").unwrap()["popular"].hit_count, 0);
        cache.get("popular").unwrap();
        cache.build(&named("", "", "other", false)).unwrap();
    }

    let cache = h.start().unwrap();
    assert_eq!(cache.list("").unwrap()["popular"].hit_count, 1);
}

#[test]
fn test_delete_survives_restart() {
    let mut h = Harness::new();
    {
        let cache = h.start().unwrap();
        cache.build(&named("", "", "keep", false)).unwrap();
        cache.build(&named("", "", "drop", false)).unwrap();
        cache.delete("drop").unwrap();
    }

    let cache = h.start().unwrap();
    let names: Vec<_> = cache.list("").unwrap().into_keys().collect();
    assert_eq!(names, vec!["keep"]);
    assert!(!h.trie.contains("drop"));
}

#[test]
fn test_name_collision_after_restart() {
    let mut h = Harness::new();
    {
        let cache = h.start().unwrap();
        cache.build(&named("", "", "dup", false)).unwrap();
    }

    let cache = h.start().unwrap();
    assert!(cache.build(&named("", "", "dup", false)).is_err());
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let mut h = Harness::new();
    let orphan = {
        let cache = h.start().unwrap();
        cache.build(&named("", "", "lost", false)).unwrap();
        cache.get("lost").unwrap().path
    };

    fs::write(h.cache_dir().join(SNAPSHOT_FILENAME), "{\"lost\": {\"path\": 12").unwrap();

    let cache = h.start().unwrap();
    assert!(cache.is_empty());
    assert!(h.trie.is_empty());
    // the artifact is orphaned, not removed
    assert!(orphan.exists());

    // the cache keeps working and the next mutation overwrites the bad snapshot
    cache.build(&named("", "", "fresh", false)).unwrap();
    drop(cache);
    let cache = h.start().unwrap();
    let names: Vec<_> = cache.list("").unwrap().into_keys().collect();
    assert_eq!(names, vec!["fresh"]);
}

#[test]
fn test_snapshot_schema() {
    let mut h = Harness::new();
    let cache = h.start().unwrap();
    cache.build(&named("windows", "amd64", "schema", true)).unwrap();

    let raw = fs::read_to_string(cache.snapshot_path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &json["schema"];

    assert!(entry["path"].as_str().unwrap().ends_with(".dll"));
    assert_eq!(entry["operatingSystem"], "windows");
    assert_eq!(entry["architecture"], "amd64");
    assert_eq!(entry["artifactKind"], "shared-object");
    assert_eq!(entry["hitCount"], 0);
    assert_eq!(entry["version"], "v0.0.0-mock");
}

#[test]
fn test_snapshot_loaded_from_hand_written_file() {
    let mut h = Harness::new();
    fs::create_dir_all(h.cache_dir()).unwrap();
    fs::write(
        h.cache_dir().join(SNAPSHOT_FILENAME),
        r#"{
  "legacy": {
    "path": "/var/cache/rssh/Zx81PqLmA0bC2dEf",
    "operatingSystem": "linux",
    "architecture": "arm64",
    "artifactKind": "executable",
    "hitCount": 12,
    "version": "v1.0.0"
  }
}"#,
    )
    .unwrap();

    let cache = h.start().unwrap();
    let record = cache.get("legacy").unwrap();
    assert_eq!(record.hit_count, 13);
    assert_eq!(record.architecture, "arm64");
    assert!(h.trie.contains("legacy"));
}

// === Snapshot failures ===

#[test]
fn test_snapshot_write_failure_keeps_changes_in_memory() {
    let mut h = Harness::new();
    let cache = h.start().unwrap();
    fs::create_dir(cache.snapshot_path()).unwrap();

    let url = cache.build(&named("linux", "amd64", "x", false)).unwrap();
    assert_eq!(url, "http://server.example:2200/x");
    let record = cache.get("x").unwrap();
    assert_eq!(record.operating_system, "linux");
    assert!(record.path.is_file());
    assert!(h.trie.contains("x"));

    cache.delete("x").unwrap();
    assert!(cache.get("x").unwrap_err().is_not_found());
    assert!(!record.path.exists());
    assert!(!h.trie.contains("x"));

    // no temp files left behind by the failed writes
    assert!(h.artifact_files().is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_unserializable_record_rolls_back_build() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    use rssh_buildcache::CacheError;

    let mut h = Harness::new();
    h.config.cache_dir = h.temp.path().join(OsStr::from_bytes(b"cache-\xff"));
    let cache = h.start().unwrap();
    let err = cache.build(&named("", "", "after", false)).unwrap_err();
    assert!(matches!(err, CacheError::Persistence(_)));
    assert!(cache.is_empty());
    assert!(!h.trie.contains("after"));
    assert!(h.artifact_files().is_empty());
    assert!(!cache.snapshot_path().exists());
}
