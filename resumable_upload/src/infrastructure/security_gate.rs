// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Security Gate (C8)
//!
//! The single entry point every upload request passes through before a byte
//! of it reaches the pipeline: file validation, rate limiting, access-token
//! lifecycle, and per-file chunk encryption keys. Each concern is owned by
//! its own adapter ([`DashMapRateLimiter`], [`AesGcmEncryptionService`]) or
//! domain function ([`validate_file`]); this module is the thing that binds
//! them to one request.
//!
//! Access tokens are the one piece of state [`AccessToken`] explicitly
//! leaves to infrastructure: the active-token set and the per-user cap live
//! here as a `DashMap<String, Vec<AccessToken>>`, oldest-first, with the
//! oldest evicted once a user is at `max_tokens_per_user`. A fallback
//! expiration is used whenever `token_expiration_secs` is non-positive; it
//! is a fixed positive duration, not zero, so a misconfigured gate fails
//! open to "expires in an hour" rather than to tokens that self-delete on
//! the same tick they were issued.

use dashmap::DashMap;
use resumable_upload_domain::services::{
    is_suspicious_header, validate_file, FileValidationConfig, FileValidationInput, FileValidationResult,
};
use resumable_upload_domain::value_objects::{AccessToken, FileId};
use resumable_upload_domain::UploadError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::infrastructure::adapters::encryption_aes_gcm::AesGcmEncryptionService;
use crate::infrastructure::adapters::rate_limiter_dashmap::{DashMapRateLimiter, RateLimiterConfig};
use crate::infrastructure::config::{AccessControlConfig, SecurityConfig};

/// Fallback token lifetime used whenever configuration supplies a
/// non-positive `token_expiration_secs`. See the module doc for why this
/// must be positive rather than the zero a naive `unwrap_or(0)` would give.
const FALLBACK_TOKEN_EXPIRATION_MS: i64 = 3600 * 1000;

/// Window size the virus scan reads the file in, per spec §4.8 item 5.
const VIRUS_SCAN_WINDOW_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct SecurityGateConfig {
    pub max_file_size_bytes: u64,
    pub validate_file_signature: bool,
    pub enable_virus_scan: bool,
    pub token_expiration_secs: i64,
    pub max_tokens_per_user: u32,
    pub access_control_enabled: bool,
}

impl SecurityGateConfig {
    pub fn from_parts(security: &SecurityConfig, access_control: &AccessControlConfig) -> Self {
        Self {
            max_file_size_bytes: security.max_file_size_bytes,
            validate_file_signature: security.validate_file_signature,
            enable_virus_scan: security.enable_virus_scan,
            token_expiration_secs: access_control.token_expiration_secs,
            max_tokens_per_user: access_control.max_tokens_per_user,
            access_control_enabled: access_control.enabled,
        }
    }

    fn expiration_ms(&self) -> i64 {
        if self.token_expiration_secs > 0 {
            self.token_expiration_secs * 1000
        } else {
            FALLBACK_TOKEN_EXPIRATION_MS
        }
    }
}

/// Binds file validation, rate limiting, access-token lifecycle, and
/// per-file chunk encryption into one gate every upload request passes
/// through.
pub struct SecurityGate {
    config: SecurityGateConfig,
    allowed_mime_types: Vec<String>,
    allowed_extensions: Vec<String>,
    rate_limiter: DashMapRateLimiter,
    tokens: DashMap<String, Vec<AccessToken>>,
    encryption: Arc<AesGcmEncryptionService>,
    encryption_keys: DashMap<FileId, Vec<u8>>,
}

impl SecurityGate {
    pub fn new(
        config: SecurityGateConfig,
        allowed_mime_types: Vec<String>,
        allowed_extensions: Vec<String>,
        rate_limiter_config: RateLimiterConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            allowed_mime_types,
            allowed_extensions,
            rate_limiter: DashMapRateLimiter::new(rate_limiter_config),
            tokens: DashMap::new(),
            encryption: Arc::new(AesGcmEncryptionService),
            encryption_keys: DashMap::new(),
        })
    }

    /// Runs the domain's `validate_file` rules against a prospective upload.
    pub fn validate_file(&self, input: FileValidationInput<'_>) -> FileValidationResult {
        let config = FileValidationConfig {
            max_file_size: self.config.max_file_size_bytes,
            allowed_mime_types: &self.allowed_mime_types,
            allowed_extensions: &self.allowed_extensions,
            validate_file_signature: self.config.validate_file_signature,
        };
        validate_file(input, &config)
    }

    /// Streams `path` in fixed [`VIRUS_SCAN_WINDOW_BYTES`] windows, rejecting
    /// the file the moment a window starts with a known-suspicious header.
    /// A no-op when `enable_virus_scan` is off, per §4.8 item 5 of the spec
    /// this gate implements -- the file is read once, sequentially, never
    /// buffered whole in memory.
    pub async fn scan_file_for_malware(&self, path: &Path) -> Result<(), UploadError> {
        if !self.config.enable_virus_scan {
            return Ok(());
        }
        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = vec![0u8; VIRUS_SCAN_WINDOW_BYTES];
        loop {
            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            if is_suspicious_header(&buf[..read]) {
                return Err(UploadError::SecurityViolation(
                    "file contains a suspicious header and was rejected by the virus scan".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn check_rate_limit(&self, user_id: &str) -> Result<(), UploadError> {
        self.rate_limiter.check_rate_limit(user_id)
    }

    pub fn release_rate_limit(&self, user_id: &str) {
        self.rate_limiter.release_rate_limit(user_id);
    }

    /// Issues a new token for `user_id`, evicting the oldest active token
    /// for that user if they are already at `max_tokens_per_user`. Returns
    /// the token unconditionally even when access control is disabled, so
    /// callers don't need to branch on configuration to get something to
    /// hand back to a client -- [`Self::validate_token`] is what actually
    /// enforces (or no-ops) the check.
    pub fn issue_token(&self, user_id: &str, now_ms: i64) -> AccessToken {
        let token = AccessToken::issue(user_id, now_ms);
        {
            let mut active = self.tokens.entry(user_id.to_string()).or_default();
            if active.len() >= self.config.max_tokens_per_user.max(1) as usize {
                active.remove(0);
            }
            active.push(token.clone());
        }
        token
    }

    /// Validates a raw token string against the active set and its
    /// expiration. A no-op success when access control is disabled.
    pub fn validate_token(&self, raw: &str, now_ms: i64) -> Result<(), UploadError> {
        if !self.config.access_control_enabled {
            return Ok(());
        }
        let token = AccessToken::parse(raw)?;
        let expiration_ms = self.config.expiration_ms();

        let mut active = self
            .tokens
            .get_mut(token.user_id())
            .ok_or_else(|| UploadError::SecurityViolation("no active tokens for user".to_string()))?;

        let position = active
            .iter()
            .position(|t| *t == token)
            .ok_or_else(|| UploadError::SecurityViolation("token not recognized".to_string()))?;

        if token.is_expired(now_ms, expiration_ms) {
            active.remove(position);
            return Err(UploadError::SecurityViolation("token expired".to_string()));
        }

        Ok(())
    }

    /// Removes every token past its expiration for `user_id`. Intended to be
    /// driven by a periodic sweep rather than a per-token timer, since a
    /// timer per issued token would need its own cancel-on-early-revoke
    /// bookkeeping this sweep avoids entirely.
    pub fn sweep_expired_tokens(&self, user_id: &str, now_ms: i64) {
        let expiration_ms = self.config.expiration_ms();
        if let Some(mut active) = self.tokens.get_mut(user_id) {
            active.retain(|t| !t.is_expired(now_ms, expiration_ms));
        }
    }

    pub fn active_token_count(&self, user_id: &str) -> usize {
        self.tokens.get(user_id).map(|t| t.len()).unwrap_or(0)
    }

    /// Generates and binds a fresh encryption key to `file_id`, overwriting
    /// any key already bound to it. Call once, at upload start.
    pub fn bind_encryption_key(&self, file_id: FileId) -> Vec<u8> {
        let key = AesGcmEncryptionService::generate_key();
        self.encryption_keys.insert(file_id, key.clone());
        key
    }

    pub fn encryption_key_for(&self, file_id: FileId) -> Option<Vec<u8>> {
        self.encryption_keys.get(&file_id).map(|k| k.clone())
    }

    /// Destroys the encryption key bound to `file_id`. Call once the upload
    /// reaches a terminal status (completed, cancelled, or failed).
    pub fn release_encryption_key(&self, file_id: FileId) {
        self.encryption_keys.remove(&file_id);
    }

    pub fn encryption_service(&self) -> Arc<AesGcmEncryptionService> {
        Arc::clone(&self.encryption)
    }
}

/// Runs [`SecurityGate::sweep_expired_tokens`] for every user with active
/// tokens, on a fixed interval, until cancelled. Spawned once from the
/// composition root alongside the state store's autosave loop.
pub fn spawn_token_sweeper(
    gate: Arc<SecurityGate>,
    interval: Duration,
    cancellation: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancellation.cancelled() => break,
            }
            let now_ms = chrono::Utc::now().timestamp_millis();
            let users: Vec<String> = gate.tokens.iter().map(|entry| entry.key().clone()).collect();
            for user_id in users {
                gate.sweep_expired_tokens(&user_id, now_ms);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(max_tokens_per_user: u32, token_expiration_secs: i64) -> Arc<SecurityGate> {
        SecurityGate::new(
            SecurityGateConfig {
                max_file_size_bytes: 1024 * 1024,
                validate_file_signature: true,
                enable_virus_scan: false,
                token_expiration_secs,
                max_tokens_per_user,
                access_control_enabled: true,
            },
            vec!["*/*".to_string()],
            vec!["*".to_string()],
            RateLimiterConfig::default(),
        )
    }

    #[test]
    fn issuing_past_the_per_user_cap_evicts_the_oldest() {
        let gate = gate(2, 3600);
        let first = gate.issue_token("user-1", 0);
        let _second = gate.issue_token("user-1", 1);
        let _third = gate.issue_token("user-1", 2);

        assert_eq!(gate.active_token_count("user-1"), 2);
        assert!(gate.validate_token(&first.to_string(), 10).is_err());
    }

    #[test]
    fn a_freshly_issued_token_validates() {
        let gate = gate(5, 3600);
        let token = gate.issue_token("user-1", 1_000);
        assert!(gate.validate_token(&token.to_string(), 1_500).is_ok());
    }

    #[test]
    fn an_expired_token_is_rejected_and_removed() {
        let gate = gate(5, 1);
        let token = gate.issue_token("user-1", 0);
        assert!(gate.validate_token(&token.to_string(), 5_000).is_err());
        assert_eq!(gate.active_token_count("user-1"), 0);
    }

    #[test]
    fn a_non_positive_expiration_falls_back_to_a_positive_default_not_zero() {
        let gate = gate(5, 0);
        let token = gate.issue_token("user-1", 0);
        // With the buggy "fallback defaults to zero" behavior this would
        // already be expired at the same millisecond it was issued.
        assert!(gate.validate_token(&token.to_string(), 0).is_ok());
    }

    #[test]
    fn disabled_access_control_accepts_any_token_string() {
        let gate = SecurityGate::new(
            SecurityGateConfig {
                max_file_size_bytes: 1024,
                validate_file_signature: false,
                enable_virus_scan: false,
                token_expiration_secs: 3600,
                max_tokens_per_user: 5,
                access_control_enabled: false,
            },
            vec!["*/*".to_string()],
            vec!["*".to_string()],
            RateLimiterConfig::default(),
        );
        assert!(gate.validate_token("not-even-a-real-token", 0).is_ok());
    }

    #[test]
    fn encryption_keys_are_bound_per_file_and_released_on_demand() {
        let gate = gate(5, 3600);
        let file_id = FileId::new();
        assert!(gate.encryption_key_for(file_id).is_none());
        let key = gate.bind_encryption_key(file_id);
        assert_eq!(gate.encryption_key_for(file_id), Some(key));
        gate.release_encryption_key(file_id);
        assert!(gate.encryption_key_for(file_id).is_none());
    }

    #[test]
    fn rate_limiting_delegates_to_the_inner_limiter() {
        let gate = SecurityGate::new(
            SecurityGateConfig {
                max_file_size_bytes: 1024,
                validate_file_signature: false,
                enable_virus_scan: false,
                token_expiration_secs: 3600,
                max_tokens_per_user: 5,
                access_control_enabled: false,
            },
            vec!["*/*".to_string()],
            vec!["*".to_string()],
            RateLimiterConfig {
                window_ms: 60_000,
                max_requests_per_minute: 1,
                max_concurrent_uploads: 1,
            },
        );
        assert!(gate.check_rate_limit("user-1").is_ok());
        assert!(gate.check_rate_limit("user-1").is_err());
        gate.release_rate_limit("user-1");
    }

    fn gate_with_virus_scan(enable_virus_scan: bool) -> Arc<SecurityGate> {
        SecurityGate::new(
            SecurityGateConfig {
                max_file_size_bytes: 1024 * 1024,
                validate_file_signature: false,
                enable_virus_scan,
                token_expiration_secs: 3600,
                max_tokens_per_user: 5,
                access_control_enabled: false,
            },
            vec!["*/*".to_string()],
            vec!["*".to_string()],
            RateLimiterConfig::default(),
        )
    }

    #[tokio::test]
    async fn virus_scan_rejects_a_file_starting_with_an_executable_header() {
        let gate = gate_with_virus_scan(true);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[0x4D, 0x5A, 0x90, 0x00]).unwrap();

        let result = gate.scan_file_for_malware(file.path()).await;
        assert!(matches!(result, Err(UploadError::SecurityViolation(_))));
    }

    #[tokio::test]
    async fn virus_scan_accepts_an_ordinary_file() {
        let gate = gate_with_virus_scan(true);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"just some ordinary bytes").unwrap();

        assert!(gate.scan_file_for_malware(file.path()).await.is_ok());
    }

    #[tokio::test]
    async fn virus_scan_is_a_no_op_when_disabled() {
        let gate = gate_with_virus_scan(false);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[0x4D, 0x5A]).unwrap();

        assert!(gate.scan_file_for_malware(file.path()).await.is_ok());
    }
}
