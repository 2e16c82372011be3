//! File-based cache layer with TTL and source-mtime invalidation.
//!
//! Keys are hashed (sha256, hex) to derive cache filenames so arbitrary
//! key strings never touch the filesystem's path rules. The index is a
//! single JSON document written atomically (temp file + rename) so a
//! crash mid-write can never corrupt it — a corrupt or missing index is
//! treated as empty and rebuilt from there.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{OrcError, OrcResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    timestamp: f64,
    ttl: u64,
    source_path: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    entries: HashMap<String, IndexEntry>,
}

pub struct Cache {
    cache_dir: PathBuf,
    default_ttl: u64,
    index_file: PathBuf,
    index: CacheIndex,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn mtime_secs(path: &Path) -> std::io::Result<f64> {
    let meta = fs::metadata(path)?;
    let modified = meta.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64())
}

pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

impl Cache {
    pub fn new(cache_dir: impl Into<PathBuf>, default_ttl: u64) -> OrcResult<Cache> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .map_err(|e| OrcError::cache(format!("cannot create cache directory {}: {e}", cache_dir.display())))?;
        let index_file = cache_dir.join("cache_index.json");
        let index = Self::load_index(&index_file);
        tracing::debug!(path = %cache_dir.display(), "cache initialized");
        Ok(Cache { cache_dir, default_ttl, index_file, index })
    }

    fn load_index(index_file: &Path) -> CacheIndex {
        if !index_file.exists() {
            tracing::debug!("cache index not found, starting fresh");
            return CacheIndex::default();
        }
        match fs::read_to_string(index_file).ok().and_then(|s| serde_json::from_str(&s).ok()) {
            Some(index) => index,
            None => {
                tracing::warn!("cache index corrupted, rebuilding");
                CacheIndex::default()
            }
        }
    }

    fn save_index(&self) -> OrcResult<()> {
        let temp_file = self.index_file.with_extension("tmp");
        let body = serde_json::to_string(&self.index)?;
        fs::write(&temp_file, body)
            .map_err(|e| OrcError::cache(format!("cannot write cache index: {e}")))?;
        fs::rename(&temp_file, &self.index_file)
            .map_err(|e| OrcError::cache(format!("cannot rename cache index into place: {e}")))?;
        Ok(())
    }

    fn key_hash(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.cache", Self::key_hash(key)))
    }

    /// Removes an entry from both the index and disk. Used for both
    /// explicit invalidation and automatic cleanup during `get`.
    fn remove(&mut self, key: &str) {
        if self.index.entries.remove(key).is_some() {
            let _ = self.save_index();
        }
        let path = self.cache_path(key);
        if path.exists() {
            let _ = fs::remove_file(&path);
        }
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&mut self, key: &str) -> Option<T> {
        let entry = self.index.entries.get(key)?.clone();

        let age = now_secs() - entry.timestamp;
        if age > entry.ttl as f64 {
            tracing::debug!(key, age, ttl = entry.ttl, "cache expired");
            self.remove(key);
            return None;
        }

        if let Some(source_path) = &entry.source_path {
            let source = Path::new(source_path);
            match mtime_secs(source) {
                Err(_) => {
                    tracing::debug!(key, "cache invalidated: source missing or unreadable");
                    self.remove(key);
                    return None;
                }
                Ok(mtime) if mtime > entry.timestamp => {
                    tracing::debug!(key, "cache stale: source modified");
                    self.remove(key);
                    return None;
                }
                Ok(_) => {}
            }
        }

        let path = self.cache_path(key);
        if !path.exists() {
            tracing::warn!(key, "cache file missing, removing from index");
            self.remove(key);
            return None;
        }

        match fs::read_to_string(&path).ok().and_then(|s| serde_json::from_str(&s).ok()) {
            Some(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            None => {
                tracing::warn!(key, "cache file corrupted");
                self.remove(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
        source_path: Option<&Path>,
    ) -> OrcResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let path = self.cache_path(key);
        let body = serde_json::to_string(value)?;
        fs::write(&path, body).map_err(|e| OrcError::cache(format!("cannot write cache file: {e}")))?;

        self.index.entries.insert(
            key.to_string(),
            IndexEntry {
                timestamp: now_secs(),
                ttl,
                source_path: source_path.map(|p| p.to_string_lossy().into_owned()),
            },
        );

        if let Err(e) = self.save_index() {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        tracing::debug!(key, ttl, "cached");
        Ok(())
    }

    pub fn is_fresh(&self, key: &str, source_path: &Path) -> bool {
        let Some(entry) = self.index.entries.get(key) else { return false };
        if now_secs() - entry.timestamp > entry.ttl as f64 {
            return false;
        }
        mtime_secs(source_path).map(|mtime| mtime <= entry.timestamp).unwrap_or(false)
    }

    pub fn invalidate(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                tracing::info!(key, "invalidating cache key");
                self.remove(key);
            }
            None => {
                tracing::info!("invalidating entire cache");
                if let Ok(entries) = fs::read_dir(&self.cache_dir) {
                    for entry in entries.flatten() {
                        if entry.path().extension().and_then(|e| e.to_str()) == Some("cache") {
                            let _ = fs::remove_file(entry.path());
                        }
                    }
                }
                self.index.entries.clear();
                let _ = self.save_index();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut bytes = 0u64;
        if let Ok(entries) = fs::read_dir(&self.cache_dir) {
            for entry in entries.flatten() {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("cache") {
                    bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
        CacheStats { entries: self.index.entries.len(), bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new(dir.path(), 3600).unwrap();
        cache.set("key", &42u32, None, None).unwrap();
        let value: Option<u32> = cache.get("key");
        assert_eq!(value, Some(42));
    }

    #[test]
    fn expired_ttl_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new(dir.path(), 0).unwrap();
        cache.set("key", &42u32, Some(0), None).unwrap();
        sleep(Duration::from_millis(10));
        let value: Option<u32> = cache.get("key");
        assert_eq!(value, None);
    }

    #[test]
    fn stale_source_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.py");
        fs::write(&source, "x = 1").unwrap();
        let mut cache = Cache::new(dir.path(), 3600).unwrap();
        cache.set("key", &1u32, None, Some(&source)).unwrap();
        assert!(cache.is_fresh("key", &source));

        sleep(Duration::from_millis(20));
        fs::write(&source, "x = 2").unwrap();
        let value: Option<u32> = cache.get("key");
        assert_eq!(value, None);
    }

    #[test]
    fn corrupted_index_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cache_index.json"), "not json").unwrap();
        let cache = Cache::new(dir.path(), 3600).unwrap();
        assert_eq!(cache.index.entries.len(), 0);
    }

    #[test]
    fn invalidate_all_clears_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::new(dir.path(), 3600).unwrap();
        cache.set("a", &1u32, None, None).unwrap();
        cache.set("b", &2u32, None, None).unwrap();
        cache.invalidate(None);
        assert_eq!(cache.stats().entries, 0);
    }
}
