use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::error::{CacheError, Error};

const PROBE_FILE_NAME: &str = "testfile";

struct FileEntry {
    path: PathBuf,
    len: usize,
}

struct Inner {
    map: HashMap<u64, FileEntry>,
    lru: VecDeque<u64>,
    size: usize,
}

/// A persistent LRU cache that stores byte blobs as flat files on disk under a
/// size ceiling, with the same hit/miss contract as [`crate::cache::Cache`].
///
/// Keys are `u64` (typically hash values). For key `K`, the value lives at
/// `<root>/<hex(K & 0xff)>/<hex(K >> 8)>` with no header or checksum — the file
/// bytes are exactly the stored value. A file named `testfile` at the cache root
/// is reserved for the write-permission probe run at construction.
///
/// All filesystem errors on [`FileCache::find`] degrade to a miss rather than an
/// error: a file externally deleted between registration and read is simply
/// treated as absent, and the stale index entry is pruned lazily the next time
/// [`FileCache::insert`] sees the same key. `find` takes the write lock directly
/// rather than attempting a read-to-write lock upgrade, since `parking_lot`'s
/// `RwLock` has no such upgrade.
pub struct FileCache {
    root: PathBuf,
    capacity: usize,
    stats: CacheStats,
    inner: RwLock<Inner>,
}

impl FileCache {
    /// Opens (creating if necessary) a file cache rooted at `directory`, able to
    /// hold up to `capacity` bytes. Fails if the directory can't be created or
    /// written to, or if `capacity` exceeds the filesystem's reported capacity.
    pub fn new(directory: impl Into<PathBuf>, capacity: usize) -> Result<Self, CacheError> {
        let root = directory.into();

        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                CacheError::Io(Error::trace(
                    format!("failed to create cache directory '{}'", root.display()),
                    e,
                ))
            })?;
        } else if !root.is_dir() {
            return Err(CacheError::Io(Error::new(format!(
                "cache directory '{}' is not a directory",
                root.display()
            ))));
        }
        probe_writable(&root)?;

        if let Ok(total) = fs4::total_space(&root) {
            if capacity as u64 > total {
                return Err(CacheError::Io(Error::new(format!(
                    "file cache capacity {} exceeds filesystem capacity {}",
                    capacity, total
                ))));
            }
        }

        let cache = Self {
            root,
            capacity,
            stats: CacheStats::new(capacity),
            inner: RwLock::new(Inner {
                map: HashMap::new(),
                lru: VecDeque::new(),
                size: 0,
            }),
        };
        cache.load_existing_contents();
        Ok(cache)
    }

    fn load_existing_contents(&self) {
        let mut inner = self.inner.write();
        let Ok(top) = fs::read_dir(&self.root) else {
            return;
        };
        for subdir_entry in top.flatten() {
            let subdir_path = subdir_entry.path();
            if !subdir_path.is_dir() {
                continue; // root-level files are not ours, per the contract
            }
            let Some(subdir_name) = subdir_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(files) = fs::read_dir(&subdir_path) else {
                continue;
            };
            for file_entry in files.flatten() {
                let path = file_entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Some(key) = parse_key(subdir_name, file_name) else {
                    continue;
                };
                let Ok(len) = path.metadata().map(|m| m.len() as usize) else {
                    continue;
                };
                if inner.size + len > self.capacity {
                    continue; // leave on disk, untracked
                }
                inner.size += len;
                inner.map.insert(key, FileEntry { path, len });
                inner.lru.push_back(key);
            }
        }
        self.stats.set_current_size(inner.size);
    }

    /// Reads the bytes stored under `key`. Any filesystem error, including the
    /// file having been removed externally, is reported as a miss.
    pub fn find(&self, key: u64) -> Option<Vec<u8>> {
        let mut inner = self.inner.write();

        let path = match inner.map.get(&key) {
            Some(entry) => entry.path.clone(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.stats.record_miss();
                return None;
            }
        };

        inner.lru.retain(|k| *k != key);
        inner.lru.push_back(key);
        self.stats.record_hit();
        Some(bytes)
    }

    /// Stores `bytes` under `key`. A key already present with a live file is a
    /// no-op success. When `perform_cleanup` is set, LRU entries are evicted to
    /// make room; otherwise insufficient space is a plain refusal.
    pub fn insert(&self, key: u64, bytes: &[u8], perform_cleanup: bool) -> Result<bool, CacheError> {
        let mut inner = self.inner.write();

        if let Some(entry) = inner.map.get(&key) {
            if entry.path.exists() {
                return Ok(true);
            }
            let stale = inner.map.remove(&key).unwrap();
            inner.size -= stale.len;
            inner.lru.retain(|k| *k != key);
        }

        let value_len = bytes.len();
        if value_len > self.capacity {
            return Ok(false);
        }

        let free = self.capacity - inner.size;
        if free < value_len {
            if !perform_cleanup || !cleanup_locked(&mut inner, &self.stats, value_len, self.capacity) {
                return Ok(false);
            }
        }

        let (subdir, filename) = key_to_path_parts(key);
        let dir = self.root.join(&subdir);
        let path = dir.join(&filename);

        if write_file(&dir, &path, bytes).is_err() {
            return Ok(false);
        }

        inner.size += value_len;
        inner.map.insert(key, FileEntry { path, len: value_len });
        inner.lru.push_back(key);
        self.stats.set_current_size(inner.size);
        self.stats.record_insert();
        Ok(true)
    }

    /// Evicts LRU entries (deleting their files) until at least `space_needed`
    /// bytes are free, or the queue empties first (in which case `false` is
    /// returned).
    pub fn clean(&self, space_needed: usize) -> bool {
        let mut inner = self.inner.write();
        cleanup_locked(&mut inner, &self.stats, space_needed, self.capacity)
    }

    /// Tracked keys in least-recently-used to most-recently-used order.
    pub fn contents(&self) -> Vec<u64> {
        self.inner.read().lru.iter().copied().collect()
    }

    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

fn cleanup_locked(inner: &mut Inner, stats: &CacheStats, space_needed: usize, capacity: usize) -> bool {
    while capacity - inner.size < space_needed {
        let Some(key) = inner.lru.pop_front() else {
            return false;
        };
        if let Some(entry) = inner.map.remove(&key) {
            let _ = fs::remove_file(&entry.path);
            inner.size -= entry.len;
            stats.record_eviction();
        }
    }
    stats.set_current_size(inner.size);
    true
}

fn probe_writable(root: &Path) -> Result<(), CacheError> {
    let probe_path = root.join(PROBE_FILE_NAME);
    fs::write(&probe_path, b"test").map_err(|e| {
        CacheError::Io(Error::trace(
            format!("directory '{}' is not writable", root.display()),
            e,
        ))
    })?;
    let _ = fs::remove_file(&probe_path);
    Ok(())
}

fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    } else if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "expected subdirectory, found a file",
        ));
    }
    fs::write(path, bytes)
}

fn key_to_path_parts(key: u64) -> (String, String) {
    (format!("{:x}", key & 0xff), format!("{:x}", key >> 8))
}

fn parse_key(subdir: &str, filename: &str) -> Option<u64> {
    let low = u64::from_str_radix(subdir, 16).ok()?;
    let high = u64::from_str_radix(filename, 16).ok()?;
    Some((high << 8) | low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_several_keys() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 100).unwrap();
        for (key, value) in [
            (1u64, b"first".to_vec()),
            (2, b"second".to_vec()),
            (500, b"five hundred".to_vec()),
            (u64::MAX, b"max".to_vec()),
        ] {
            assert!(cache.insert(key, &value, true).unwrap());
            assert_eq!(cache.find(key), Some(value));
        }
    }

    #[test]
    fn size_ceiling_evicts_lru_on_demand() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 8).unwrap();
        cache.insert(1, b"1", true).unwrap();
        cache.insert(2, b"12", true).unwrap();
        cache.insert(3, b"123", true).unwrap();
        cache.find(1);
        cache.insert(4, b"1234", true).unwrap();

        let mut contents = cache.contents();
        contents.sort_unstable();
        assert_eq!(contents, vec![1, 3, 4]);
        assert_eq!(cache.size(), 8);
        assert_eq!(cache.find(2), None);
    }

    #[test]
    fn insert_without_cleanup_refuses_when_full() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 4).unwrap();
        cache.insert(1, b"1234", true).unwrap();
        assert!(!cache.insert(2, b"5", false).unwrap());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let cache = FileCache::new(dir.path(), 100).unwrap();
            cache.insert(1, b"hello", true).unwrap();
            cache.insert(2, b"world", true).unwrap();
        }
        let reopened = FileCache::new(dir.path(), 100).unwrap();
        assert_eq!(reopened.find(1), Some(b"hello".to_vec()));
        assert_eq!(reopened.find(2), Some(b"world".to_vec()));
    }

    #[test]
    fn externally_deleted_file_is_reported_as_a_miss() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 100).unwrap();
        cache.insert(42, b"value", true).unwrap();
        let (subdir, filename) = key_to_path_parts(42);
        let path = dir.path().join(subdir).join(filename);
        fs::remove_file(path).unwrap();
        assert_eq!(cache.find(42), None);
    }

    #[test]
    fn oversized_value_is_refused() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path(), 4).unwrap();
        assert!(!cache.insert(1, b"too big for this cache", true).unwrap());
    }
}
