// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # AES-GCM Chunk Encryption (C8, encryption half)
//!
//! One 256-bit key is generated per `fileId` at upload start
//! ([`Self::generate_key`]) and held only for the life of that upload; the
//! security gate is responsible for destroying it on terminal status. Every
//! chunk gets its own fresh 12-byte IV -- reusing a nonce under the same key
//! breaks AES-GCM's authentication guarantee -- and the wire format is
//! `IV ‖ ciphertext` per [`split_iv`].

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use resumable_upload_domain::services::{split_iv, EncryptionService, IV_LEN_BYTES};
use resumable_upload_domain::UploadError;

/// AES-256-GCM implementation of the encryption port. The key length is
/// fixed at 256 bits: the only `keySize` the distilled configuration's
/// `encryption.keySize` is expected to carry in this reimplementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmEncryptionService;

impl AesGcmEncryptionService {
    pub const KEY_LEN_BYTES: usize = 32;

    /// Draws a fresh random 256-bit key, meant to be generated once per
    /// `fileId` at upload start and held by the security gate's active-key
    /// table until the upload reaches a terminal status.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; Self::KEY_LEN_BYTES];
        OsRng.fill_bytes(&mut key);
        key
    }
}

impl EncryptionService for AesGcmEncryptionService {
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, UploadError> {
        if key.len() != Self::KEY_LEN_BYTES {
            return Err(UploadError::InvalidConfiguration(format!(
                "AES-256-GCM requires a {}-byte key, got {}",
                Self::KEY_LEN_BYTES,
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let mut iv = [0u8; IV_LEN_BYTES];
        OsRng.fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| UploadError::Internal(format!("AES-GCM encryption failed: {e}")))?;
        let mut out = Vec::with_capacity(IV_LEN_BYTES + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, blob: &[u8], key: &[u8]) -> Result<Vec<u8>, UploadError> {
        if key.len() != Self::KEY_LEN_BYTES {
            return Err(UploadError::InvalidConfiguration(format!(
                "AES-256-GCM requires a {}-byte key, got {}",
                Self::KEY_LEN_BYTES,
                key.len()
            )));
        }
        let (iv, ciphertext) = split_iv(blob)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let nonce = Nonce::from_slice(iv);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| UploadError::Internal(format!("AES-GCM decryption failed: {e}")))
    }
}
