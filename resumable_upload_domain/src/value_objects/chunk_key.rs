// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cache keys for the chunk cache (C4): identifies a source file by name,
//! size and modification time, and a chunk within that file by index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a source file for caching purposes without relying on the
/// engine-assigned `FileId`, since the cache is meant to survive across
/// separate upload attempts of the same file before a `FileId` even exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileKey {
    file_name: String,
    file_size: u64,
    last_modified_ms: i64,
}

impl FileKey {
    pub fn new(file_name: impl Into<String>, file_size: u64, last_modified_ms: i64) -> Self {
        FileKey {
            file_name: file_name.into(),
            file_size,
            last_modified_ms,
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.file_name, self.file_size, self.last_modified_ms)
    }
}

/// Composite key for one chunk of one file within the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub file_key: FileKey,
    pub chunk_index: u64,
}

impl ChunkKey {
    pub fn new(file_key: FileKey, chunk_index: u64) -> Self {
        ChunkKey { file_key, chunk_index }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_key, self.chunk_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_cache_key_layout() {
        let key = FileKey::new("a.bin", 1024, 1_700_000_000_000);
        assert_eq!(key.to_string(), "a.bin-1024-1700000000000");
    }
}
