// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Chunk Value Object
//!
//! `FileChunk` is the unit the chunker (C1) produces and the pipeline (C10)
//! carries from source to sink. It is immutable: every transform (compress,
//! encrypt, checksum) returns a new chunk via a `with_*` builder rather than
//! mutating the original.
//!
//! A chunk is either a `Binary` payload (a byte range of the source file) or
//! a `Lines` payload (a batch of parsed rows from a CSV/Excel/text file) --
//! see [`ChunkPayload`]. `total` may be `Unknown` while a line-based parser
//! is still reading; the chunker patches every previously emitted chunk to a
//! `Known` total before declaring the sequence complete.

use crate::value_objects::ChunkSize;
use crate::UploadError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Total chunk count for a file, possibly not yet known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkTotal {
    Known(u64),
    Unknown,
}

impl ChunkTotal {
    pub fn value(&self) -> Option<u64> {
        match self {
            ChunkTotal::Known(n) => Some(*n),
            ChunkTotal::Unknown => None,
        }
    }
}

/// A single parsed row of a tabular chunk: an ordered sequence of cell
/// strings (already sanitized by the time it reaches the pipeline).
pub type Row = Vec<String>;

/// The chunk's content, distinguishing the chunker's two production modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPayload {
    /// A contiguous byte range of the source file.
    Binary(Vec<u8>),
    /// An ordered batch of parsed rows (CSV / Excel / line-delimited text).
    Lines(Vec<Row>),
}

impl ChunkPayload {
    pub fn len(&self) -> usize {
        match self {
            ChunkPayload::Binary(b) => b.len(),
            ChunkPayload::Lines(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte-serializes the payload for transforms (compression, encryption,
    /// checksumming) that operate on bytes regardless of chunk kind. Lines
    /// payloads are JSON-encoded first, per the compressor's gating rule.
    pub fn as_bytes(&self) -> Result<Vec<u8>, UploadError> {
        match self {
            ChunkPayload::Binary(b) => Ok(b.clone()),
            ChunkPayload::Lines(rows) => Ok(serde_json::to_vec(rows)?),
        }
    }
}

/// An immutable chunk of upload data, produced by the chunker and carried
/// through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    id: Uuid,
    index: u64,
    total: ChunkTotal,
    offset: u64,
    payload: ChunkPayload,
    checksum: Option<String>,
}

impl FileChunk {
    /// Creates a new binary chunk covering `[offset, offset + data.len())`.
    pub fn new_binary(index: u64, offset: u64, data: Vec<u8>, total: ChunkTotal) -> Result<Self, UploadError> {
        if data.is_empty() {
            return Err(UploadError::invalid_chunk("chunk data cannot be empty"));
        }
        ChunkSize::new(data.len())?;
        Ok(FileChunk {
            id: Uuid::new_v4(),
            index,
            total,
            offset,
            payload: ChunkPayload::Binary(data),
            checksum: None,
        })
    }

    /// Creates a new chunk of parsed table rows; `index` counts chunks, not
    /// rows, and `offset` is the cumulative row count preceding this chunk.
    pub fn new_lines(index: u64, row_offset: u64, rows: Vec<Row>, total: ChunkTotal) -> Result<Self, UploadError> {
        if rows.is_empty() {
            return Err(UploadError::invalid_chunk("chunk rows cannot be empty"));
        }
        Ok(FileChunk {
            id: Uuid::new_v4(),
            index,
            total,
            offset: row_offset,
            payload: ChunkPayload::Lines(rows),
            checksum: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn total(&self) -> ChunkTotal {
        self.total
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn payload(&self) -> &ChunkPayload {
        &self.payload
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn is_final(&self) -> bool {
        matches!(self.total, ChunkTotal::Known(n) if self.index + 1 == n)
    }

    /// Returns a new chunk with `total` patched to the now-known value,
    /// leaving everything else unchanged. Used by line-based parsers once
    /// EOF is reached.
    pub fn with_total(&self, total: ChunkTotal) -> Self {
        FileChunk {
            total,
            ..self.clone()
        }
    }

    /// Returns a new chunk with `checksum` set; the previous checksum, if
    /// any, is discarded.
    pub fn with_checksum(&self, checksum: String) -> Self {
        FileChunk {
            checksum: Some(checksum),
            ..self.clone()
        }
    }

    /// Computes and attaches the SHA-256 checksum of the chunk's byte
    /// representation.
    pub fn with_calculated_checksum(&self) -> Result<Self, UploadError> {
        let checksum = self.calculate_checksum()?;
        Ok(self.with_checksum(checksum))
    }

    pub fn calculate_checksum(&self) -> Result<String, UploadError> {
        let bytes = self.payload.as_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Re-hashes the payload and compares against the stored checksum.
    pub fn verify_integrity(&self) -> Result<bool, UploadError> {
        match &self.checksum {
            Some(stored) => Ok(self.calculate_checksum()? == *stored),
            None => Err(UploadError::invalid_chunk("no checksum available for verification")),
        }
    }
}
