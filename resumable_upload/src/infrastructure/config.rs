// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! [`EngineConfig`] is the single struct tree the rest of the crate reads
//! from. It loads in layers -- compiled-in defaults, an optional config
//! file, then environment variables -- using the same `config` crate
//! layering the teacher pipeline uses, so a deployment can override one
//! field (say `chunk.defaultSizeBytes`) without restating the whole file.

use resumable_upload_domain::services::{FileTypeConfig, SanitizerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub default_size_bytes: u64,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
    pub low_memory_size_bytes: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            default_size_bytes: 1024 * 1024,
            min_size_bytes: 1,
            max_size_bytes: 512 * 1024 * 1024,
            low_memory_size_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_uploads: usize,
    pub worker_pool_size: usize,
    pub max_queue_depth: usize,
    /// Per-file pipeline parallelism: how many chunks of a single upload may
    /// be in flight (read, transformed, or sent) at once. Distinct from
    /// `max_concurrent_uploads`, which bounds how many different files the
    /// scheduler runs at once.
    pub concurrent_streams: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 3,
            worker_pool_size: 4,
            max_queue_depth: 1000,
            concurrent_streams: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimitsConfig {
    pub max_memory_bytes: u64,
    pub max_open_streams: usize,
    pub max_cache_entries: usize,
    pub cache_ttl_secs: u64,
    /// Fraction of `max_memory_bytes` at which the resource accountant's
    /// threshold callbacks fire.
    pub warning_threshold: f64,
    /// Fraction of `max_memory_bytes` at which the periodic sweep also
    /// disposes every resource carrying a dispose capability.
    pub critical_threshold: f64,
    /// How often `ResourceAccountant::spawn_cleanup`'s periodic sweep runs.
    pub cleanup_interval_secs: u64,
    /// Whether the composition root spawns the periodic sweep at all.
    pub enable_auto_cleanup: bool,
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024,
            max_open_streams: 16,
            max_cache_entries: 512,
            cache_ttl_secs: 300,
            warning_threshold: 0.75,
            critical_threshold: 0.9,
            cleanup_interval_secs: 30,
            enable_auto_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_file_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub validate_file_signature: bool,
    pub enable_virus_scan: bool,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub access_token_ttl_secs: i64,
    pub encrypt_chunks: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024 * 1024,
            allowed_mime_types: vec!["*/*".to_string()],
            allowed_extensions: vec!["*".to_string()],
            validate_file_signature: true,
            enable_virus_scan: false,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 100,
            access_token_ttl_secs: 3600,
            encrypt_chunks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries_override: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries_override: None }
    }
}

/// Resumability: how chunk-level progress is persisted and replayed across
/// process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumableConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub checksum_verification: bool,
    /// `"memory"` or `"sqlite"`; selects which [`StateStore`] adapter the
    /// composition root wires up.
    ///
    /// [`StateStore`]: resumable_upload_domain::services::StateStore
    pub storage_adapter: String,
    pub auto_save_interval_ms: u64,
}

impl Default for ResumableConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            retry_delay_ms: 1000,
            checksum_verification: true,
            storage_adapter: "memory".to_string(),
            auto_save_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessControlConfig {
    pub enabled: bool,
    pub token_expiration_secs: i64,
    pub max_tokens_per_user: u32,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token_expiration_secs: 3600,
            max_tokens_per_user: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/upload".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Root configuration tree. `Default` gives a fully usable engine; callers
/// typically start from `EngineConfig::load()` which layers a file and the
/// `RESUMABLE_UPLOAD_*` environment prefix on top of these defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk: ChunkConfig,
    pub concurrency: ConcurrencyConfig,
    pub resources: ResourceLimitsConfig,
    pub security: SecurityConfig,
    pub retry: RetryConfig,
    pub endpoint: EndpointConfig,
    pub resumable: ResumableConfig,
    pub access_control: AccessControlConfig,
    /// Per-MIME-pattern chunking mode overrides, evaluated first match wins.
    /// Empty by default; [`crate::infrastructure::adapters::chunker_tabular`]
    /// and the size-mode chunker fall back to the global `chunk` settings
    /// when no entry here matches.
    pub chunking_rules: Vec<FileTypeConfig>,
    pub compression_enabled: bool,
    pub log_level: String,
    /// C2 cell-sanitation tunables (HTML allow-list, max cell length) for
    /// the tabular chunker's line-mode path.
    pub sanitizer: SanitizerConfig,
}

impl EngineConfig {
    /// Loads defaults, then an optional `path` TOML file, then
    /// `RESUMABLE_UPLOAD_*` environment overrides. A missing file at `path`
    /// is not an error -- only a malformed one is.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&EngineConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("RESUMABLE_UPLOAD").separator("__"));
        builder.build()?.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = EngineConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let back: EngineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back.chunk.default_size_bytes, config.chunk.default_size_bytes);
    }

    #[test]
    fn loading_with_no_file_still_succeeds() {
        let config = EngineConfig::load(Some("/nonexistent/path/does-not-exist")).unwrap();
        assert_eq!(config.concurrency.worker_pool_size, 4);
    }
}
