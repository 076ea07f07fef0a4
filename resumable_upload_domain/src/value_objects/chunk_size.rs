// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! A type-safe, validated representation of a chunk's byte size, used by the
//! chunker (size-based mode) and by every component that needs to reason
//! about chunk boundaries without re-validating raw `usize` values.
//!
//! ## Design Principles
//!
//! - **Immutability**: once created, a `ChunkSize` cannot be modified.
//! - **Validation**: bounds are enforced at construction time, not at point
//!   of use.
//! - **Value Semantics**: two `ChunkSize`s are equal iff their byte counts
//!   are equal.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};

/// A validated chunk size, bounded to `[MIN_SIZE, MAX_SIZE]` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkSize {
    bytes: usize,
}

impl ChunkSize {
    /// Minimum chunk size (1 byte) - zero-byte chunks are meaningless.
    pub const MIN_SIZE: usize = 1;

    /// Maximum chunk size (512MB) - bounds peak in-flight memory.
    pub const MAX_SIZE: usize = 512 * 1024 * 1024;

    /// Default chunk size (1MB).
    pub const DEFAULT_SIZE: usize = 1024 * 1024;

    /// Creates a new chunk size, validating that `bytes` is within bounds.
    pub fn new(bytes: usize) -> Result<Self, UploadError> {
        if bytes < Self::MIN_SIZE {
            return Err(UploadError::InvalidConfiguration(format!(
                "chunk size {} is below minimum of {} bytes",
                bytes,
                Self::MIN_SIZE
            )));
        }
        if bytes > Self::MAX_SIZE {
            return Err(UploadError::InvalidConfiguration(format!(
                "chunk size {} exceeds maximum of {} bytes",
                bytes,
                Self::MAX_SIZE
            )));
        }
        Ok(ChunkSize { bytes })
    }

    pub fn from_kb(kb: usize) -> Result<Self, UploadError> {
        Self::new(kb * 1024)
    }

    pub fn from_mb(mb: usize) -> Result<Self, UploadError> {
        Self::new(mb * 1024 * 1024)
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn kilobytes(&self) -> f64 {
        (self.bytes as f64) / 1024.0
    }

    pub fn megabytes(&self) -> f64 {
        (self.bytes as f64) / (1024.0 * 1024.0)
    }

    /// Number of chunks a file of `file_size` bytes splits into under this
    /// chunk size. `0` for an empty file.
    pub fn chunks_needed_for_file(&self, file_size: u64) -> u64 {
        if file_size == 0 {
            return 0;
        }
        file_size.div_ceil(self.bytes as u64)
    }

    /// Clamps `self` so that at most `max_parallel_chunks` in-flight chunks
    /// of this size would fit inside `available_memory`.
    pub fn adjust_for_memory(
        &self,
        available_memory: usize,
        max_parallel_chunks: usize,
    ) -> Result<Self, UploadError> {
        let max_chunk_size = available_memory / max_parallel_chunks.max(1);
        let adjusted = self.bytes.min(max_chunk_size).max(Self::MIN_SIZE);
        Self::new(adjusted)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize {
            bytes: Self::DEFAULT_SIZE,
        }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bytes >= 1024 * 1024 {
            write!(f, "{:.1}MB", self.megabytes())
        } else if self.bytes >= 1024 {
            write!(f, "{:.1}KB", self.kilobytes())
        } else {
            write!(f, "{}B", self.bytes)
        }
    }
}
