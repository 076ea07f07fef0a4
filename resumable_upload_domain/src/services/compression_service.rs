// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compression Port (C3)
//!
//! Raw DEFLATE compression is CPU-bound, so the port is synchronous; the
//! infrastructure crate provides the `flate2`-backed implementation (kept
//! out of the domain crate's dependency graph). The gating rule -- compress
//! only if the payload exceeds 1 KiB -- is pure and lives here.

use crate::value_objects::FileChunk;
use crate::UploadError;
use serde::{Deserialize, Serialize};

/// Threshold above which a chunk is worth compressing.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

pub fn should_compress(chunk: &FileChunk) -> bool {
    chunk.payload().len() > COMPRESSION_THRESHOLD_BYTES
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    pub wall_time_ms: u64,
}

impl CompressionStats {
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 1.0;
        }
        self.compressed_size as f64 / self.original_size as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedChunk {
    pub chunk: FileChunk,
    pub compressed: bool,
    pub stats: Option<CompressionStats>,
}

pub trait CompressionService: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, UploadError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ChunkTotal;

    #[test]
    fn gating_respects_1kb_threshold() {
        let small = FileChunk::new_binary(0, 0, vec![0u8; 1024], ChunkTotal::Known(1)).unwrap();
        let large = FileChunk::new_binary(0, 0, vec![0u8; 1025], ChunkTotal::Known(1)).unwrap();
        assert!(!should_compress(&small));
        assert!(should_compress(&large));
    }

    #[test]
    fn ratio_handles_empty_input_without_dividing_by_zero() {
        let stats = CompressionStats {
            original_size: 0,
            compressed_size: 0,
            wall_time_ms: 0,
        };
        assert_eq!(stats.ratio(), 1.0);
    }
}
