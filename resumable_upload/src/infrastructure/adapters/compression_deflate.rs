// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DEFLATE Compressor (C3)
//!
//! Raw DEFLATE, no zlib/gzip framing -- the wire format carries its own
//! chunk/compressed metadata, so there is nothing for a container format to
//! add. [`should_compress`](resumable_upload_domain::services::compression_service::should_compress)
//! gates whether this adapter is even invoked; decompression is always
//! attempted for a chunk the sender marked compressed.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use resumable_upload_domain::services::CompressionService;
use resumable_upload_domain::UploadError;
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy)]
pub struct DeflateCompressionService {
    level: Compression,
}

impl Default for DeflateCompressionService {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl DeflateCompressionService {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl CompressionService for DeflateCompressionService {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, UploadError> {
        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(data)
            .map_err(|e| UploadError::Internal(format!("deflate compress failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| UploadError::Internal(format!("deflate compress failed: {e}")))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, UploadError> {
        let mut decoder = DeflateDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| UploadError::Internal(format!("deflate decompress failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompress_reverses_compress_byte_for_byte() {
        let svc = DeflateCompressionService::default();
        let original = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = svc.compress(&original).unwrap();
        assert!(compressed.len() < original.len());
        let round_tripped = svc.decompress(&compressed).unwrap();
        assert_eq!(round_tripped, original);
    }

    #[test]
    fn empty_input_round_trips() {
        let svc = DeflateCompressionService::default();
        let compressed = svc.compress(&[]).unwrap();
        assert_eq!(svc.decompress(&compressed).unwrap(), Vec::<u8>::new());
    }
}
