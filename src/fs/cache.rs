//! Encoded-size cache for getattr.
//!
//! Working out the size of a virtual file means opening the source and
//! scanning its metadata, and `ls -l` does that for every entry. Entries are
//! keyed by source path and only trusted while the source mtime and size
//! still match.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use lru::LruCache;

use super::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    mtime: SystemTime,
    source_size: u64,
    encoded_size: u64,
}

pub struct StatCache {
    entries: Option<Mutex<LruCache<PathBuf, Entry>>>,
}

impl StatCache {
    /// A zero capacity disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    pub fn get(&self, source: &Path, mtime: SystemTime, source_size: u64) -> Option<u64> {
        let mut entries = lock(self.entries.as_ref()?);
        let entry = entries.get(source).copied()?;
        if entry.mtime == mtime && entry.source_size == source_size {
            return Some(entry.encoded_size);
        }
        entries.pop(source);
        None
    }

    pub fn insert(&self, source: &Path, mtime: SystemTime, source_size: u64, encoded_size: u64) {
        if let Some(entries) = &self.entries {
            lock(entries).put(
                source.to_path_buf(),
                Entry {
                    mtime,
                    source_size,
                    encoded_size,
                },
            );
        }
    }
}
