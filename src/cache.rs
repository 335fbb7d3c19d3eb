//! On-disk response cache with separate metadata and data namespaces.
//!
//! Each namespace is a directory of JSON documents, one per request key, with its
//! own time-to-live. Expiry is checked on read; nothing is evicted in the background.

use crate::error::{Error, Result};
use ahash::RandomState;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LOG_TARGET: &str = "ine_rs::cache";

pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_DATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// Fixed seeds keep file names stable across processes.
fn key_hash(key: &str) -> u64 {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
    .hash_one(key)
}

const QUERY: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cache partition; each has its own directory and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Catalogue and indicator metadata.
    Metadata,
    /// Indicator observations.
    Data,
}

impl Namespace {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Metadata => "metadata",
            Namespace::Data => "data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub metadata_ttl: Duration,
    pub data_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            metadata_ttl: DEFAULT_METADATA_TTL,
            data_ttl: DEFAULT_DATA_TTL,
        }
    }
}

impl CacheConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }
}

/// `<platform cache dir>/ine-rs`, falling back to the system temp dir.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ine-rs")
}

/// Canonical cache key for a GET request: URL plus query sorted by name.
pub fn request_key(url: &str, query: &[(String, String)]) -> String {
    let mut pairs: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", utf8_percent_encode(k, QUERY), utf8_percent_encode(v, QUERY)))
        .collect();
    pairs.sort();
    format!("{url}?{}", pairs.join("&"))
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    stored_at: DateTime<Utc>,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub dir: PathBuf,
    pub metadata_entries: usize,
    pub data_entries: usize,
    pub total_entries: usize,
    pub size_bytes: u64,
    pub metadata_ttl: Duration,
    pub data_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    config: CacheConfig,
}

impl DiskCache {
    /// Open (and create if needed) the cache directories.
    pub fn new(config: CacheConfig) -> Result<Self> {
        for ns in [Namespace::Metadata, Namespace::Data] {
            let dir = config.dir.join(ns.dir_name());
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Cache(format!("Failed to create cache directory '{}': {e}", dir.display()))
            })?;
        }
        log::info!(target: LOG_TARGET, "Using cache directory: {}", config.dir.display());
        Ok(Self { config })
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn ttl(&self, ns: Namespace) -> Duration {
        match ns {
            Namespace::Metadata => self.config.metadata_ttl,
            Namespace::Data => self.config.data_ttl,
        }
    }

    pub fn session(&self, ns: Namespace) -> CacheSession {
        CacheSession {
            dir: self.config.dir.join(ns.dir_name()),
            ttl: self.ttl(ns),
        }
    }

    /// Remove every cached entry in both namespaces.
    pub fn clear(&self) -> Result<()> {
        for ns in [Namespace::Metadata, Namespace::Data] {
            let dir = self.config.dir.join(ns.dir_name());
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .map_err(|e| Error::Cache(format!("Failed to clear cache: {e}")))?;
            }
            fs::create_dir_all(&dir)
                .map_err(|e| Error::Cache(format!("Failed to recreate cache directory: {e}")))?;
        }
        log::info!(target: LOG_TARGET, "Cache cleared successfully");
        Ok(())
    }

    /// Number of stored entries across namespaces (expired ones included).
    pub fn size(&self) -> usize {
        self.session(Namespace::Metadata).len() + self.session(Namespace::Data).len()
    }

    pub fn stats(&self) -> CacheStats {
        let metadata_entries = self.session(Namespace::Metadata).len();
        let data_entries = self.session(Namespace::Data).len();
        CacheStats {
            dir: self.config.dir.clone(),
            metadata_entries,
            data_entries,
            total_entries: metadata_entries + data_entries,
            size_bytes: dir_size(&self.config.dir),
            metadata_ttl: self.config.metadata_ttl,
            data_ttl: self.config.data_ttl,
        }
    }
}

/// Handle on one namespace.
#[derive(Debug, Clone)]
pub struct CacheSession {
    dir: PathBuf,
    ttl: Duration,
}

impl CacheSession {
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:016x}.json", key_hash(key)))
    }

    /// Cached body for `key`, if present and younger than the TTL.
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => {
                log::debug!(target: LOG_TARGET, "Cache miss for {key}");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_reader(BufReader::new(file)) {
            Ok(e) => e,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Unreadable cache entry for {key}: {e}");
                return None;
            }
        };
        if entry.key != key {
            log::debug!(target: LOG_TARGET, "Cache key collision for {key}");
            return None;
        }

        // Future timestamps (clock skew) count as fresh.
        let age = Utc::now()
            .signed_duration_since(entry.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age < self.ttl {
            log::debug!(target: LOG_TARGET, "Cache hit for {key} (age: {}s)", age.as_secs());
            Some(entry.body)
        } else {
            log::debug!(target: LOG_TARGET, "Cache expired for {key} (age: {}s)", age.as_secs());
            None
        }
    }

    /// Store `body` under `key`, replacing any previous entry.
    pub fn put(&self, key: &str, body: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let entry = CacheEntry {
            key: key.to_string(),
            stored_at: Utc::now(),
            body: body.to_string(),
        };

        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &entry)?;
            writer.flush()?;
            drop(writer);
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Cache(format!("unable to write cache file '{}': {e}", path.display()))
        })
    }

    pub fn remove(&self, key: &str) -> bool {
        fs::remove_file(self.path_for(key)).is_ok()
    }

    pub fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(rd) = fs::read_dir(path) else {
        return 0;
    };
    rd.filter_map(|e| e.ok())
        .map(|e| match e.metadata() {
            Ok(m) if m.is_dir() => dir_size(&e.path()),
            Ok(m) => m.len(),
            Err(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &Path, data_ttl: Duration) -> DiskCache {
        DiskCache::new(CacheConfig {
            dir: dir.to_path_buf(),
            metadata_ttl: DEFAULT_METADATA_TTL,
            data_ttl,
        })
        .unwrap()
    }

    #[test]
    fn request_key_is_order_independent() {
        let a = request_key(
            "https://x/p",
            &[("b".into(), "2".into()), ("a".into(), "1 2".into())],
        );
        let b = request_key(
            "https://x/p",
            &[("a".into(), "1 2".into()), ("b".into(), "2".into())],
        );
        assert_eq!(a, b);
        assert_eq!(a, "https://x/p?a=1%202&b=2");
    }

    #[test]
    fn put_then_get_and_namespaces_are_separate() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path(), DEFAULT_DATA_TTL);
        let data = cache.session(Namespace::Data);
        let meta = cache.session(Namespace::Metadata);

        data.put("k1", "{\"a\":1}").unwrap();
        data.put("k1", "{\"a\":1}").unwrap();
        meta.put("k2", "<xml/>").unwrap();

        assert_eq!(data.get("k1").as_deref(), Some("{\"a\":1}"));
        assert_eq!(meta.get("k1"), None);
        assert_eq!(cache.size(), 2);

        let stats = cache.stats();
        assert_eq!(stats.metadata_entries, 1);
        assert_eq!(stats.data_entries, 1);
        assert!(stats.size_bytes > 0);
    }

    #[test]
    fn zero_ttl_entries_are_expired() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path(), Duration::ZERO);
        let data = cache.session(Namespace::Data);
        data.put("k", "body").unwrap();
        assert_eq!(data.get("k"), None);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path(), DEFAULT_DATA_TTL);
        cache.session(Namespace::Data).put("a", "1").unwrap();
        cache.session(Namespace::Metadata).put("b", "2").unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.size(), 0);
        assert!(cache.session(Namespace::Data).get("a").is_none());
    }
}
