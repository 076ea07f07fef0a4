// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Error
//!
//! The single error type shared by every layer of the upload engine. Domain
//! logic, infrastructure adapters, and the application services all return
//! `Result<T, UploadError>`; only the bootstrap binary converts errors into
//! process exit codes.
//!
//! Two error families live side by side here: structural domain errors
//! (`InvalidChunk`, `IntegrityError`, ...) raised directly by this crate, and
//! the operational taxonomy (`Network`, `Server`, `Validation`, `Storage`,
//! `Unknown`) used to classify failures that cross a transport or storage
//! boundary for retry-policy purposes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity assigned to a classified error, used to decide whether an error
/// is merely logged, surfaced as a warning, or treated as fatal for the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Info => "info",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// The operational classification used by the retry policy (error
/// classifier). Distinct from the structural `UploadError` variants below:
/// any `UploadError` can be mapped to one of these kinds by
/// [`UploadError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Server,
    Validation,
    Storage,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Errors produced anywhere in the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A chunk violates a structural invariant (bad index, size out of
    /// bounds, non-contiguous offset).
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// File validation (size, MIME, extension, signature, virus scan) failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A checksum comparison did not match; the data is considered corrupt.
    #[error("integrity check failed: {0}")]
    IntegrityError(String),

    /// An HTTP request to the sink endpoint failed at the transport level.
    #[error("network error: {0}")]
    Network(String),

    /// The sink endpoint responded with a non-2xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The state-store or chunk-cache backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The memory / resource budget was exceeded and could not be reclaimed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Rate limit, concurrency cap, or access-token check rejected the
    /// request.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// The upload (or a single chunk attempt) was cancelled.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn invalid_chunk(msg: impl Into<String>) -> Self {
        Self::InvalidChunk(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Maps this error onto the operational taxonomy used by the error
    /// classifier / retry policy. Structural domain errors that have no
    /// retry-relevant analog fall back to `Unknown`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Network(_) => ErrorKind::Network,
            UploadError::Server { .. } => ErrorKind::Server,
            UploadError::Validation(_) => ErrorKind::Validation,
            UploadError::Storage(_) => ErrorKind::Storage,
            UploadError::IntegrityError(_) => ErrorKind::Validation,
            UploadError::InvalidChunk(_) | UploadError::InvalidConfiguration(_) => ErrorKind::Validation,
            UploadError::ResourceExhausted(_) => ErrorKind::Storage,
            UploadError::SecurityViolation(_) => ErrorKind::Validation,
            UploadError::Cancelled(_) => ErrorKind::Unknown,
            UploadError::Io(_) => ErrorKind::Storage,
            UploadError::Serialization(_) => ErrorKind::Unknown,
            UploadError::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Classifies an opaque message using the same keyword heuristics the
    /// retry policy applies to errors it did not originate (HTTP client
    /// errors, storage-backend errors). Kept as a fallback: anything raised
    /// directly by this crate should carry a tagged variant instead.
    pub fn classify_message(message: &str) -> ErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("network") || lower.contains("offline") || lower.contains("connection") {
            ErrorKind::Network
        } else if lower.contains("server") || lower.contains("timeout") || lower.contains(" 5") {
            ErrorKind::Server
        } else if lower.contains("validation") || lower.contains("invalid") || lower.contains("format") {
            ErrorKind::Validation
        } else if lower.contains("storage") || lower.contains("quota") || lower.contains("space") {
            ErrorKind::Storage
        } else {
            ErrorKind::Unknown
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            UploadError::SecurityViolation(_) | UploadError::Cancelled(_) | UploadError::Internal(_)
        )
    }

    pub fn recommendation(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Network => "check connection",
            ErrorKind::Server => "try again later",
            ErrorKind::Validation => "check input",
            ErrorKind::Storage => "free up space",
            ErrorKind::Unknown => "unexpected error",
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_keywords() {
        assert_eq!(UploadError::classify_message("network offline"), ErrorKind::Network);
        assert_eq!(UploadError::classify_message("request timeout"), ErrorKind::Server);
        assert_eq!(
            UploadError::classify_message("invalid format"),
            ErrorKind::Validation
        );
        assert_eq!(UploadError::classify_message("disk quota exceeded"), ErrorKind::Storage);
        assert_eq!(UploadError::classify_message("whatever"), ErrorKind::Unknown);
    }

    #[test]
    fn structural_errors_map_to_expected_kind() {
        assert_eq!(UploadError::invalid_chunk("bad offset").kind(), ErrorKind::Validation);
        assert_eq!(UploadError::server(503, "busy").kind(), ErrorKind::Server);
        assert_eq!(
            UploadError::SecurityViolation("rate limited".into()).is_recoverable(),
            false
        );
    }
}
