//! Content-change cache
//!
//! Local mtimes are unreliable: checkouts, clones and editors rewrite them
//! without touching content. The cache remembers, per local file, the digest
//! of the bytes last synchronized and the instant of that sync. A comparison
//! uses the cached instant only while the file still hashes to the cached
//! digest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};

/// One remembered sync of a local file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex digest of the file content at sync time
    pub sha1: String,
    /// When the content was synchronized
    #[serde(serialize_with = "serialize_millis", deserialize_with = "deserialize_rfc3339")]
    pub updated_at: DateTime<Utc>,
}

/// Per-kind persisted mapping from absolute local path to [`CacheEntry`]
#[derive(Debug)]
pub struct ContentCache {
    file: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl ContentCache {
    /// Load the cache file for `kind` from `cache_dir`; a missing file is an empty cache
    pub async fn open(cache_dir: impl AsRef<Path>, kind: &str) -> Result<Self> {
        let file = cache_dir.as_ref().join(format!("cache.{}.yaml", kind));

        let entries = match fs::read_to_string(&file).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_yaml::from_str(&content)
                .map_err(|e| SyncError::format_error(&file, format!("Unreadable cache: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SyncError::local_io(&file, e)),
        };

        debug!("Loaded {} cache entries from {}", entries.len(), file.display());

        Ok(Self {
            file,
            entries,
            dirty: false,
        })
    }

    /// Cache that is never persisted
    pub fn in_memory() -> Self {
        Self {
            file: PathBuf::new(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(&cache_key(path))
    }

    /// Remember the current content of `path` as synchronized at `when`
    pub async fn record_upload(&mut self, path: &Path, when: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let sha1 = digest_file(path).await?;
        self.entries.insert(cache_key(path), CacheEntry { sha1, updated_at: when });
        self.dirty = true;
        Ok(when)
    }

    /// Instant of the last sync, provided the file content has not changed since
    pub async fn lookup(&self, path: &Path) -> Option<DateTime<Utc>> {
        let entry = self.entries.get(&cache_key(path))?;
        let current = digest_file(path).await.ok()?;
        if current == entry.sha1 {
            Some(entry.updated_at)
        } else {
            None
        }
    }

    /// Write the cache back if anything changed
    pub async fn save(&mut self) -> Result<()> {
        if !self.dirty || self.file.as_os_str().is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::local_io(parent, e))?;
        }

        let content = serde_yaml::to_string(&self.entries)?;
        fs::write(&self.file, content)
            .await
            .map_err(|e| SyncError::local_io(&self.file, e))?;
        self.dirty = false;

        debug!("Saved {} cache entries to {}", self.entries.len(), self.file.display());
        Ok(())
    }
}

/// SHA-1 hex digest of a file's bytes
pub async fn digest_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).await.map_err(|e| SyncError::local_io(path, e))?;
    Ok(digest_bytes(&bytes))
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn serialize_millis<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn deserialize_rfc3339<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap() + chrono::Duration::milliseconds(250)
    }

    #[tokio::test]
    async fn test_lookup_after_record_returns_instant() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("index.html");
        fs::write(&file, b"<h1>hi</h1>").await.unwrap();

        let mut cache = ContentCache::open(temp_dir.path().join(".cache"), "files").await.unwrap();
        let when = cache.record_upload(&file, instant()).await.unwrap();

        assert_eq!(when, instant());
        assert_eq!(cache.lookup(&file).await, Some(instant()));
    }

    #[tokio::test]
    async fn test_lookup_misses_after_content_change() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("index.html");
        fs::write(&file, b"v1").await.unwrap();

        let mut cache = ContentCache::in_memory();
        cache.record_upload(&file, instant()).await.unwrap();
        fs::write(&file, b"v2").await.unwrap();

        assert_eq!(cache.lookup(&file).await, None);
    }

    #[tokio::test]
    async fn test_lookup_unknown_or_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ContentCache::in_memory();
        assert_eq!(cache.lookup(&temp_dir.path().join("nope")).await, None);
    }

    #[tokio::test]
    async fn test_persisted_round_trip_keeps_millis() {
        let temp_dir = TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join(".solsync");
        let file = temp_dir.path().join("script.lua");
        fs::write(&file, b"--#ENDPOINT GET /x").await.unwrap();

        let mut cache = ContentCache::open(&cache_dir, "endpoints").await.unwrap();
        cache.record_upload(&file, instant()).await.unwrap();
        cache.save().await.unwrap();

        let raw = fs::read_to_string(cache_dir.join("cache.endpoints.yaml")).await.unwrap();
        assert!(raw.contains("2024-05-06T07:08:09.250Z"));
        assert!(raw.contains(&digest_bytes(b"--#ENDPOINT GET /x")));

        let reloaded = ContentCache::open(&cache_dir, "endpoints").await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.lookup(&file).await, Some(instant()));
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cache.files.yaml"), b"- not\n- a map").await.unwrap();

        let result = ContentCache::open(temp_dir.path(), "files").await;
        assert!(matches!(result, Err(SyncError::Format { .. })));
    }

    #[test]
    fn test_digest_is_sha1_hex() {
        assert_eq!(digest_bytes(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
