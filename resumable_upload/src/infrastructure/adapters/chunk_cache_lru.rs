// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # LRU Chunk Cache (C4)
//!
//! Bounded-capacity, TTL-expiring cache of recently produced chunks. A miss
//! here is never an error -- the pipeline simply re-produces the chunk from
//! the source file -- so this adapter only ever returns `Option`, never
//! surfaces eviction or expiry as a failure.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use resumable_upload_domain::services::{is_cache_hit_valid, ChunkCache};
use resumable_upload_domain::value_objects::{ChunkKey, FileChunk};
use std::num::NonZeroUsize;
use std::time::Duration;

struct Entry {
    chunk: FileChunk,
    stored_at: DateTime<Utc>,
}

/// In-memory LRU cache bounded by entry count and wall-clock age.
pub struct LruChunkCache {
    entries: Mutex<LruCache<ChunkKey, Entry>>,
    max_age: Duration,
}

impl LruChunkCache {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
            max_age,
        }
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(stored_at);
        age.to_std().map(|a| a > self.max_age).unwrap_or(true)
    }

    /// Sweeps expired entries. Called before every `set` per the spec's
    /// "expire-sweep, then evict oldest if full, then store" ordering.
    fn sweep_expired(&self) {
        let mut entries = self.entries.lock();
        let expired: Vec<ChunkKey> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry.stored_at))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}

impl ChunkCache for LruChunkCache {
    fn get(&self, key: &ChunkKey) -> Option<FileChunk> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if self.is_expired(entry.stored_at) {
            entries.pop(key);
            return None;
        }
        let chunk = entry.chunk.clone();
        match is_cache_hit_valid(&chunk) {
            Ok(true) => Some(chunk),
            _ => {
                entries.pop(key);
                None
            }
        }
    }

    fn set(&self, key: ChunkKey, chunk: FileChunk) {
        self.sweep_expired();
        self.entries.lock().put(
            key,
            Entry {
                chunk,
                stored_at: Utc::now(),
            },
        );
    }

    fn invalidate(&self, key: &ChunkKey) {
        self.entries.lock().pop(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resumable_upload_domain::value_objects::{ChunkTotal, FileKey};

    fn key(index: u64) -> ChunkKey {
        ChunkKey::new(FileKey::new("a.bin", 1024, 0), index)
    }

    fn chunk(index: u64) -> FileChunk {
        FileChunk::new_binary(index, 0, vec![1, 2, 3], ChunkTotal::Known(4))
            .unwrap()
            .with_calculated_checksum()
            .unwrap()
    }

    #[test]
    fn a_fresh_entry_hits_on_get() {
        let cache = LruChunkCache::new(4, Duration::from_secs(60));
        cache.set(key(0), chunk(0));
        assert!(cache.get(&key(0)).is_some());
    }

    #[test]
    fn cold_cache_is_a_plain_miss() {
        let cache = LruChunkCache::new(4, Duration::from_secs(60));
        assert!(cache.get(&key(0)).is_none());
    }

    #[test]
    fn capacity_overflow_evicts_the_oldest_entry() {
        let cache = LruChunkCache::new(2, Duration::from_secs(60));
        cache.set(key(0), chunk(0));
        cache.set(key(1), chunk(1));
        cache.set(key(2), chunk(2));
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn expired_entries_are_treated_as_a_miss() {
        let cache = LruChunkCache::new(4, Duration::from_millis(0));
        cache.set(key(0), chunk(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key(0)).is_none());
    }

    #[test]
    fn invalidate_removes_the_entry_outright() {
        let cache = LruChunkCache::new(4, Duration::from_secs(60));
        cache.set(key(0), chunk(0));
        cache.invalidate(&key(0));
        assert!(cache.get(&key(0)).is_none());
    }
}
