// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain services: the pure/sync algorithms (checksum, sanitizer,
//! compression gating, encryption framing, error classification, retry
//! policy, file validation, rate limiting) plus the async I/O ports
//! (chunker, state store, chunk cache, upload sink) that infrastructure
//! adapters implement.

pub mod checksum_service;
pub mod chunk_cache;
pub mod chunker;
pub mod compression_service;
pub mod encryption_service;
pub mod error_classifier;
pub mod file_validation;
pub mod http_sink;
pub mod rate_limiter;
pub mod retry_policy;
pub mod sanitizer;
pub mod state_store;

pub use checksum_service::{incremental_file_checksum, ChecksumService, Sha256ChecksumService};
pub use chunk_cache::{is_cache_hit_valid, ChunkCache};
pub use chunker::{size_mode_chunk_range, ChunkerService, ChunkingMode, FileTypeConfig};
pub use compression_service::{
    should_compress, CompressedChunk, CompressionService, CompressionStats, COMPRESSION_THRESHOLD_BYTES,
};
pub use encryption_service::{split_iv, EncryptionService, IV_LEN_BYTES};
pub use error_classifier::{classify_severity, ClassificationContext, ErrorReport};
pub use file_validation::{is_suspicious_header, known_signature, validate_file, FileValidationConfig, FileValidationInput, FileValidationResult};
pub use http_sink::{ChunkUploadRequest, UploadSink};
pub use rate_limiter::SlidingWindow;
pub use retry_policy::{default_strategy, handle_error, BackoffCurve, RetryStrategy};
pub use sanitizer::{AllowedTag, DefaultSanitizer, Sanitizer, SanitizerConfig};
pub use state_store::{chunk_state_key, upload_state_key, StateStore};
