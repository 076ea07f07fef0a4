// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Port (C8 encryption half)
//!
//! AES-GCM chunk encryption. The AEAD primitive itself lives in the
//! infrastructure crate (`aes-gcm`, `ring` for secure IV generation are kept
//! out of the domain's dependency graph); the domain fixes the wire layout
//! (`IV ‖ ciphertext`) and key lifecycle rules that don't depend on a
//! specific crypto backend.

use crate::UploadError;

/// Nonce length for AES-GCM, fixed at 96 bits per the construction's
/// standard recommendation.
pub const IV_LEN_BYTES: usize = 12;

pub trait EncryptionService: Send + Sync {
    /// Encrypts `plaintext` under `key`, returning `IV ‖ ciphertext`.
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, UploadError>;

    /// Splits the leading IV off `ciphertext` and decrypts the remainder.
    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, UploadError>;
}

/// Splits an `IV ‖ ciphertext` blob into its two parts, the layout every
/// encryption adapter must produce and consume.
pub fn split_iv(blob: &[u8]) -> Result<(&[u8], &[u8]), UploadError> {
    if blob.len() < IV_LEN_BYTES {
        return Err(UploadError::invalid_chunk("ciphertext shorter than IV"));
    }
    Ok(blob.split_at(IV_LEN_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_iv_rejects_undersized_blobs() {
        assert!(split_iv(&[0u8; IV_LEN_BYTES - 1]).is_err());
        assert!(split_iv(&[0u8; IV_LEN_BYTES]).is_ok());
    }

    #[test]
    fn split_iv_divides_at_the_fixed_offset() {
        let blob = vec![9u8; IV_LEN_BYTES + 5];
        let (iv, ciphertext) = split_iv(&blob).unwrap();
        assert_eq!(iv.len(), IV_LEN_BYTES);
        assert_eq!(ciphertext.len(), 5);
    }
}
