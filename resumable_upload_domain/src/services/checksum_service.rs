// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checksum Service
//!
//! SHA-256 checksum calculation and verification for chunks. Purely
//! CPU-bound, so the domain port is synchronous; an infrastructure adapter
//! wraps it in `tokio::task::spawn_blocking` for use from the async
//! pipeline.

use crate::value_objects::FileChunk;
use crate::UploadError;
use sha2::{Digest, Sha256};

/// Domain service for checksum calculation and verification.
///
/// This trait is **synchronous**: the domain layer defines what the
/// operation is, not how it is scheduled. Infrastructure adapters provide
/// async wrappers where needed.
pub trait ChecksumService: Send + Sync {
    /// Computes the SHA-256 checksum of a chunk's byte representation.
    fn checksum(&self, chunk: &FileChunk) -> Result<String, UploadError>;

    /// Compares a chunk's current checksum against a freshly computed one.
    fn verify(&self, chunk: &FileChunk, expected: &str) -> Result<bool, UploadError> {
        Ok(self.checksum(chunk)? == expected)
    }
}

/// SHA-256 implementation of [`ChecksumService`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256ChecksumService;

impl ChecksumService for Sha256ChecksumService {
    fn checksum(&self, chunk: &FileChunk) -> Result<String, UploadError> {
        let bytes = chunk.payload().as_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Computes the whole-file checksum incrementally, one chunk at a time, so
/// the state store can stamp `UploadState.checksum` without buffering the
/// entire file in memory.
pub fn incremental_file_checksum<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for bytes in chunks {
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ChunkTotal;

    #[test]
    fn verify_matches_freshly_computed_checksum() {
        let chunk = FileChunk::new_binary(0, 0, vec![1, 2, 3], ChunkTotal::Known(1)).unwrap();
        let svc = Sha256ChecksumService;
        let checksum = svc.checksum(&chunk).unwrap();
        assert!(svc.verify(&chunk, &checksum).unwrap());
        assert!(!svc.verify(&chunk, "wrong").unwrap());
    }

    #[test]
    fn incremental_checksum_is_order_sensitive() {
        let a = incremental_file_checksum(vec![&b"ab"[..], &b"cd"[..]].into_iter());
        let b = incremental_file_checksum(vec![&b"cd"[..], &b"ab"[..]].into_iter());
        assert_ne!(a, b);
    }
}
