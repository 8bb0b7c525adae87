//! Integration tests for the durable result cache.

use std::sync::Arc;

use huginn::{CacheLookup, Fingerprint, MockProvider, ProviderKind, ResultCache};
use tempfile::TempDir;

fn zhipu() -> Fingerprint {
    Fingerprint::new(ProviderKind::Zhipu, "glm-4-flash")
}

fn deepseek() -> Fingerprint {
    Fingerprint::new(ProviderKind::DeepSeek, "deepseek-chat")
}

fn cache_in(dir: &TempDir) -> ResultCache {
    ResultCache::open(dir.path().join("analysis_cache.json"))
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn missing_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    assert!(cache.is_empty());
    assert!(!cache.recovered_from_corruption());
    assert_eq!(cache.get("a", &zhipu()), CacheLookup::Miss);
}

#[test]
fn hit_requires_matching_fingerprint() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    let result = MockProvider::analysis_for("hello");
    cache.put("a", result.clone(), zhipu()).unwrap();

    assert_eq!(cache.get("a", &zhipu()), CacheLookup::Hit(result));
    assert_eq!(
        cache.get("a", &deepseek()),
        CacheLookup::Stale { stored: zhipu() }
    );
}

#[test]
fn put_overwrites_entry_and_fingerprint() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.put("a", MockProvider::analysis_for("one"), zhipu()).unwrap();
    let newer = MockProvider::analysis_for("two");
    cache.put("a", newer.clone(), deepseek()).unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("a", &deepseek()), CacheLookup::Hit(newer));
    assert!(matches!(cache.get("a", &zhipu()), CacheLookup::Stale { .. }));
}

#[test]
fn model_name_whitespace_does_not_split_fingerprints() {
    assert_eq!(
        Fingerprint::new(ProviderKind::Zhipu, " glm-4-flash "),
        zhipu()
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let result = MockProvider::analysis_for("persist me");
    {
        let cache = cache_in(&dir);
        cache
            .put_many([
                ("a".to_string(), result.clone(), zhipu()),
                ("b".to_string(), MockProvider::analysis_for("b"), deepseek()),
            ])
            .unwrap();
    }

    let reopened = cache_in(&dir);
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get("a", &zhipu()), CacheLookup::Hit(result));
    let entry = reopened.entry("b").unwrap();
    assert_eq!(entry.record_id, "b");
    assert_eq!(entry.fingerprint, deepseek());
}

#[test]
fn concurrent_writers_do_not_lose_entries() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(cache_in(&dir));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let id = format!("r{i}");
                cache
                    .put(id.clone(), MockProvider::analysis_for(&id), zhipu())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 8);
    assert_eq!(cache_in(&dir).len(), 8);
}

#[test]
fn corrupt_file_is_moved_aside_and_cache_keeps_working() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("analysis_cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    let cache = ResultCache::open(&path);
    assert!(cache.recovered_from_corruption());
    assert!(cache.is_empty());
    assert!(dir.path().join("analysis_cache.json.corrupt").exists());

    cache.put("a", MockProvider::analysis_for("a"), zhipu()).unwrap();
    assert_eq!(cache_in(&dir).len(), 1);
}

// ============================================================================
// Maintenance
// ============================================================================

#[test]
fn status_reports_counts_per_model() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    let empty = cache.status();
    assert_eq!(empty.entry_count, 0);
    assert_eq!(empty.size_bytes, 0);
    assert!(empty.oldest.is_none());

    cache
        .put_many([
            ("a".to_string(), MockProvider::analysis_for("a"), zhipu()),
            ("b".to_string(), MockProvider::analysis_for("b"), zhipu()),
            ("c".to_string(), MockProvider::analysis_for("c"), deepseek()),
        ])
        .unwrap();

    let status = cache.status();
    assert_eq!(status.entry_count, 3);
    assert!(status.size_bytes > 0);
    assert_eq!(status.fingerprints.get(&zhipu()), Some(&2));
    assert_eq!(status.fingerprints.get(&deepseek()), Some(&1));
    assert!(status.oldest.unwrap() <= status.newest.unwrap());
}

#[test]
fn clear_removes_entries_and_file() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.put("a", MockProvider::analysis_for("a"), zhipu()).unwrap();
    assert!(cache.path().exists());

    cache.clear().unwrap();
    assert!(cache.is_empty());
    assert!(!cache.path().exists());
    // Clearing twice is fine.
    cache.clear().unwrap();
    assert!(cache_in(&dir).is_empty());
}
