//! Durable result cache.
//!
//! One JSON file maps record id → [`CacheEntry`]. Each entry carries the
//! fingerprint of the model that produced it; a lookup that does not accept
//! that fingerprint is reported as [`CacheLookup::Stale`] and never served.
//!
//! # On-disk format
//!
//! ```json
//! {
//!   "version": 1,
//!   "schema_version": "1.0",
//!   "last_updated": "2026-01-01T00:00:00Z",
//!   "entries": { "<record id>": { "record_id": "...", "result": {...},
//!                                 "fingerprint": "zhipu:glm-4-flash",
//!                                 "stored_at": "..." } }
//! }
//! ```
//!
//! Every write rewrites the whole file through a temporary sibling and an
//! atomic rename, so a crash mid-write leaves the previous file intact.
//!
//! # Failure handling
//!
//! The cache is fail-open. An unreadable or unparseable file is moved aside
//! to `<name>.corrupt` and the cache starts empty; a file written under a
//! different result schema is ignored. Individual entries that no longer
//! parse are dropped. All of these log a warning.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::{ANALYSIS_SCHEMA_VERSION, AnalysisResult, Fingerprint};
use crate::{HuginnError, Result};

/// Current on-disk format version.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Default cache location: `<cache_dir>/huginn/analysis_cache.json`.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("huginn")
        .join("analysis_cache.json")
}

/// A stored result and the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record_id: String,
    pub result: AnalysisResult,
    pub fingerprint: Fingerprint,
    pub stored_at: DateTime<Utc>,
}

/// Outcome of [`ResultCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(AnalysisResult),
    Miss,
    /// An entry exists but was produced by another model.
    Stale { stored: Fingerprint },
}

/// Read-only snapshot returned by [`ResultCache::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub path: PathBuf,
    pub entry_count: usize,
    /// Size of the cache file; 0 when it does not exist.
    pub size_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// Entry count per producing model.
    pub fingerprints: BTreeMap<Fingerprint, usize>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    schema_version: &'a str,
    last_updated: DateTime<Utc>,
    entries: &'a BTreeMap<String, CacheEntry>,
}

#[derive(Deserialize)]
struct RawCacheFile {
    version: u32,
    schema_version: String,
    #[serde(default)]
    entries: BTreeMap<String, serde_json::Value>,
}

/// File-backed map of record id → analysis result.
///
/// Safe to share between threads; every mutation holds an internal lock
/// while the file is rewritten, so concurrent writers serialize. Writes
/// block on disk I/O; async callers run them on the blocking pool.
#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    recovered: bool,
}

impl ResultCache {
    /// Load the cache at `path`. Never fails; see the module docs.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, recovered) = match load(&path) {
            Ok(entries) => (entries, false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "result cache unusable, starting empty");
                quarantine(&path);
                (BTreeMap::new(), true)
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "result cache opened");
        Self {
            path,
            entries: Mutex::new(entries),
            recovered,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`open`](Self::open) discarded a corrupt file.
    pub fn recovered_from_corruption(&self) -> bool {
        self.recovered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `id`, serving the result only if it was produced by `expected`.
    pub fn get(&self, id: &str, expected: &Fingerprint) -> CacheLookup {
        self.lookup(id, std::slice::from_ref(expected))
    }

    /// Look up `id`, serving the result if any of `accepted` produced it.
    pub fn lookup(&self, id: &str, accepted: &[Fingerprint]) -> CacheLookup {
        let lookup = match self.lock().get(id) {
            None => CacheLookup::Miss,
            Some(entry) if accepted.contains(&entry.fingerprint) => {
                CacheLookup::Hit(entry.result.clone())
            }
            Some(entry) => CacheLookup::Stale {
                stored: entry.fingerprint.clone(),
            },
        };
        let name = match lookup {
            CacheLookup::Hit(_) => telemetry::CACHE_HITS_TOTAL,
            CacheLookup::Miss => telemetry::CACHE_MISSES_TOTAL,
            CacheLookup::Stale { .. } => telemetry::CACHE_STALE_TOTAL,
        };
        metrics::counter!(name).increment(1);
        lookup
    }

    /// Full stored entry, regardless of fingerprint.
    pub fn entry(&self, id: &str) -> Option<CacheEntry> {
        self.lock().get(id).cloned()
    }

    /// Insert or replace the entry for `id` and persist.
    pub fn put(
        &self,
        id: impl Into<String>,
        result: AnalysisResult,
        fingerprint: Fingerprint,
    ) -> Result<()> {
        self.put_many([(id.into(), result, fingerprint)])
    }

    /// Insert or replace several entries with a single file rewrite.
    ///
    /// The in-memory view only changes once the file has been written; on
    /// error the cache is left as it was.
    pub fn put_many<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, AnalysisResult, Fingerprint)>,
    {
        let now = Utc::now();
        let mut entries = self.lock();
        let mut next = entries.clone();
        let mut changed = 0usize;
        for (record_id, result, fingerprint) in items {
            next.insert(
                record_id.clone(),
                CacheEntry {
                    record_id,
                    result,
                    fingerprint,
                    stored_at: now,
                },
            );
            changed += 1;
        }
        if changed == 0 {
            return Ok(());
        }
        persist(&self.path, &next)?;
        *entries = next;
        debug!(written = changed, total = entries.len(), "result cache saved");
        Ok(())
    }

    /// Remove every entry and delete the file.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.lock();
        entries.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn status(&self) -> CacheStatus {
        let entries = self.lock();
        let mut fingerprints = BTreeMap::new();
        for entry in entries.values() {
            *fingerprints.entry(entry.fingerprint.clone()).or_insert(0) += 1;
        }
        CacheStatus {
            path: self.path.clone(),
            entry_count: entries.len(),
            size_bytes: std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
            oldest: entries.values().map(|e| e.stored_at).min(),
            newest: entries.values().map(|e| e.stored_at).max(),
            fingerprints,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(HuginnError::CacheCorruption(e.to_string())),
    };
    let raw: RawCacheFile = serde_json::from_str(&content)
        .map_err(|e| HuginnError::CacheCorruption(e.to_string()))?;
    if raw.version > CACHE_FORMAT_VERSION {
        return Err(HuginnError::CacheCorruption(format!(
            "unsupported cache version {} (max supported: {CACHE_FORMAT_VERSION})",
            raw.version
        )));
    }
    if raw.schema_version != ANALYSIS_SCHEMA_VERSION {
        warn!(
            path = %path.display(),
            found = %raw.schema_version,
            expected = ANALYSIS_SCHEMA_VERSION,
            "cache written under another result schema, ignoring its entries"
        );
        return Ok(BTreeMap::new());
    }

    let mut entries = BTreeMap::new();
    for (id, value) in raw.entries {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => {
                entries.insert(id, entry);
            }
            Err(e) => warn!(record = %id, error = %e, "dropping unreadable cache entry"),
        }
    }
    Ok(entries)
}

fn persist(path: &Path, entries: &BTreeMap<String, CacheEntry>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = CacheFileRef {
        version: CACHE_FORMAT_VERSION,
        schema_version: ANALYSIS_SCHEMA_VERSION,
        last_updated: Utc::now(),
        entries,
    };
    let json = serde_json::to_vec_pretty(&file)?;

    let tmp = sibling(path, ".tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Move an unusable cache file out of the way so the next save cannot
/// destroy whatever is in it.
fn quarantine(path: &Path) {
    let target = sibling(path, ".corrupt");
    match std::fs::rename(path, &target) {
        Ok(()) => warn!(from = %path.display(), to = %target.display(), "moved corrupt cache aside"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not move corrupt cache aside"),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("analysis_cache.json"));
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Emotion, EmotionKind, Intent, IntentKind, ProviderKind, Sentiment, SentimentLabel,
    };

    fn sample(score: f64) -> AnalysisResult {
        AnalysisResult::new(
            Sentiment {
                score,
                label: SentimentLabel::Neutral,
                confidence: 0.9,
            },
            Intent {
                primary: IntentKind::Statement,
                secondary: vec![],
                urgency: Default::default(),
            },
            Emotion {
                primary: EmotionKind::Neutral,
                intensity: 0.3,
                mixed: false,
                transition_potential: 0.0,
            },
        )
    }

    #[test]
    fn sibling_appends_suffix() {
        let p = Path::new("/tmp/x/analysis_cache.json");
        assert_eq!(
            sibling(p, ".tmp"),
            PathBuf::from("/tmp/x/analysis_cache.json.tmp")
        );
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResultCache::open(&path);
        cache
            .put("a", sample(0.1), Fingerprint::new(ProviderKind::Zhipu, "glm-4-flash"))
            .unwrap();
        assert!(path.exists());
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let fp = Fingerprint::new(ProviderKind::Zhipu, "glm-4-flash");
        // A regular file where the cache directory should be.
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"").unwrap();
        let cache = ResultCache::open(blocker.join("cache.json"));

        assert!(cache.put("a", sample(0.1), fp.clone()).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get("a", &fp), CacheLookup::Miss);
        assert_eq!(cache.status().entry_count, 0);
    }

    #[test]
    fn lookup_accepts_any_listed_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::open(dir.path().join("cache.json"));
        let zhipu = Fingerprint::new(ProviderKind::Zhipu, "glm-4-flash");
        let deepseek = Fingerprint::new(ProviderKind::DeepSeek, "deepseek-chat");
        let openai = Fingerprint::new(ProviderKind::OpenAi, "gpt-4o-mini");
        cache.put("a", sample(0.1), deepseek.clone()).unwrap();

        let chain = [zhipu.clone(), deepseek.clone()];
        assert_eq!(cache.lookup("a", &chain), CacheLookup::Hit(sample(0.1)));
        assert_eq!(
            cache.lookup("a", &[zhipu, openai]),
            CacheLookup::Stale { stored: deepseek }
        );
        assert_eq!(cache.lookup("b", &chain), CacheLookup::Miss);
    }

    #[test]
    fn newer_format_version_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version": 99, "schema_version": "1.0", "entries": {}}"#)
            .unwrap();
        let cache = ResultCache::open(&path);
        assert!(cache.recovered_from_corruption());
        assert!(sibling(&path, ".corrupt").exists());
    }

    #[test]
    fn other_schema_version_is_ignored_not_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version": 1, "schema_version": "0.9", "entries": {}}"#)
            .unwrap();
        let cache = ResultCache::open(&path);
        assert!(cache.is_empty());
        assert!(!cache.recovered_from_corruption());
        assert!(path.exists());
    }

    #[test]
    fn unreadable_entry_is_dropped_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let fp = Fingerprint::new(ProviderKind::OpenAi, "gpt-4o-mini");
        ResultCache::open(&path).put("good", sample(0.2), fp.clone()).unwrap();

        let mut file: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        file["entries"]["bad"] = serde_json::json!({"record_id": "bad", "result": 3});
        std::fs::write(&path, file.to_string()).unwrap();

        let cache = ResultCache::open(&path);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get("good", &fp), CacheLookup::Hit(_)));
    }
}
