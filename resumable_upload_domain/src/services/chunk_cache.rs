// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Cache Port (C4)
//!
//! A bounded, TTL-expiring cache of recently produced chunks, keyed by
//! [`ChunkKey`]. The cache is an optimization only: a cold or evicted cache
//! must never change observable upload behavior, only latency. The concrete
//! LRU storage (`lru` crate) lives in the infrastructure crate; this port
//! plus the staleness check below is all the domain needs to express that
//! guarantee.

use crate::value_objects::{ChunkKey, FileChunk};
use crate::UploadError;

pub trait ChunkCache: Send + Sync {
    fn get(&self, key: &ChunkKey) -> Option<FileChunk>;
    fn set(&self, key: ChunkKey, chunk: FileChunk);
    fn invalidate(&self, key: &ChunkKey);
}

/// A cache hit is only honored if the stored chunk's checksum still matches
/// a freshly recomputed hash -- corruption (or a cache poisoned by a stale
/// write) is treated as a miss, never surfaced as an error.
pub fn is_cache_hit_valid(cached: &FileChunk) -> Result<bool, UploadError> {
    match cached.checksum() {
        Some(_) => cached.verify_integrity(),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ChunkTotal;

    #[test]
    fn chunk_without_checksum_is_never_a_valid_hit() {
        let chunk = FileChunk::new_binary(0, 0, vec![1, 2, 3], ChunkTotal::Known(1)).unwrap();
        assert!(!is_cache_hit_valid(&chunk).unwrap());
    }

    #[test]
    fn chunk_with_matching_checksum_is_a_valid_hit() {
        let chunk = FileChunk::new_binary(0, 0, vec![1, 2, 3], ChunkTotal::Known(1))
            .unwrap()
            .with_calculated_checksum()
            .unwrap();
        assert!(is_cache_hit_valid(&chunk).unwrap());
    }
}
