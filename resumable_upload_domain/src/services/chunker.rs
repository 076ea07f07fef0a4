// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunker Port
//!
//! Splitting a file into chunks requires reading from disk, so unlike the
//! purely CPU-bound domain services (checksum, compression gating) this port
//! is async -- an infrastructure concern, following the same pattern as
//! other I/O-bound ports in this layer. The domain defines the shape of the
//! configuration and the pure, file-size-only arithmetic; the infrastructure
//! crate supplies the size-mode and line-mode (CSV/Excel/text) readers.

use crate::value_objects::{ChunkSize, FileChunk, MimeType};
use crate::UploadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkingMode {
    Size,
    Lines,
}

/// Chunking configuration for one MIME pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeConfig {
    /// MIME pattern this entry applies to (`"text/csv"`, `"image/*"`,
    /// `"*/*"` as the catch-all).
    pub mime_pattern: String,
    pub mode: ChunkingMode,
    /// Size mode: bytes per chunk. Lines mode: rows per chunk.
    pub value: u64,
}

impl FileTypeConfig {
    /// Picks the first configured entry whose pattern matches `mime`,
    /// per the chunker's "first match wins" rule.
    pub fn select<'a>(configs: &'a [FileTypeConfig], mime: &MimeType) -> Option<&'a FileTypeConfig> {
        configs.iter().find(|c| mime.matches_pattern(&c.mime_pattern))
    }
}

/// A chunker port implementation produces chunks for one file, in order.
/// Implementations lazily pull bytes/rows on demand -- the chunker must not
/// eagerly read the whole file.
#[async_trait]
pub trait ChunkerService: Send + Sync {
    /// Returns the total chunk count for size-mode chunking (known
    /// up-front), or `None` if this file uses line-mode chunking, where the
    /// total is only known at EOF.
    fn total_chunks(&self, file_size: u64, config: &FileTypeConfig) -> Option<u64>;

    /// Produces the next chunk, or `Ok(None)` once the file is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<FileChunk>, UploadError>;
}

/// Pure arithmetic shared by every size-mode chunker implementation:
/// chunk `i` covers `[i*chunk_size, min((i+1)*chunk_size, file_size))`.
pub fn size_mode_chunk_range(index: u64, chunk_size: &ChunkSize, file_size: u64) -> Option<(u64, u64)> {
    let start = index * chunk_size.bytes() as u64;
    if start >= file_size {
        return None;
    }
    let end = (start + chunk_size.bytes() as u64).min(file_size);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mode_chunk_count_matches_ceiling_division() {
        let chunk_size = ChunkSize::from_kb(4).unwrap();
        let file_size = 4096 * 3 + 1;
        let config = FileTypeConfig {
            mime_pattern: "*/*".to_string(),
            mode: ChunkingMode::Size,
            value: chunk_size.bytes() as u64,
        };
        assert_eq!(chunk_size.chunks_needed_for_file(file_size), 4);
        let _ = config;
    }

    #[test]
    fn chunk_range_covers_file_contiguously() {
        let chunk_size = ChunkSize::from_kb(1).unwrap();
        let file_size = 2500;
        let mut ranges = vec![];
        let mut i = 0;
        while let Some(r) = size_mode_chunk_range(i, &chunk_size, file_size) {
            ranges.push(r);
            i += 1;
        }
        assert_eq!(ranges, vec![(0, 1024), (1024, 2048), (2048, 2500)]);
    }

    #[test]
    fn file_type_selection_prefers_first_match() {
        let configs = vec![
            FileTypeConfig {
                mime_pattern: "text/csv".to_string(),
                mode: ChunkingMode::Lines,
                value: 100,
            },
            FileTypeConfig {
                mime_pattern: "*/*".to_string(),
                mode: ChunkingMode::Size,
                value: 1024,
            },
        ];
        let mime = MimeType::sanitize("text/csv");
        let selected = FileTypeConfig::select(&configs, &mime).unwrap();
        assert_eq!(selected.mode, ChunkingMode::Lines);
    }
}
