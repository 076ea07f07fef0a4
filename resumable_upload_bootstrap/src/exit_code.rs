// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions, plus a
//! mapping from [`UploadError`](resumable_upload_domain::UploadError) so the CLI
//! process exit status reflects the kind of failure that ended the upload.
//!
//! ## Exit Code Conventions
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **128+N**: Fatal signal N (e.g., 130 = SIGINT)

use resumable_upload_domain::{ErrorKind, UploadError};
use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Input data failed validation (65)
    DataError = 65,

    /// Cannot open input (66)
    NoInput = 66,

    /// Required service unreachable, e.g. upload endpoint (69)
    Unavailable = 69,

    /// Internal software error (70)
    Software = 70,

    /// Local storage error, e.g. chunk cache or state store (71)
    OsError = 71,

    /// Cannot create output / write state (73)
    CantCreate = 73,

    /// I/O error reading the source file or writing to the sink (74)
    IoError = 74,

    /// Transient failure exhausted its retry budget (75)
    TempFail = 75,

    /// Upload endpoint returned a protocol-level error (76)
    Protocol = 76,

    /// Permission denied / security gate rejection (77)
    NoPerm = 77,

    /// Invalid or missing configuration (78)
    Config = 78,

    /// Interrupted by signal (SIGINT - Ctrl+C) (130)
    Interrupted = 130,

    /// Terminated by signal (SIGTERM) (143)
    Terminated = 143,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map an [`UploadError`] to the exit code that best describes it.
    ///
    /// Mirrors [`UploadError::kind`] / [`UploadError::is_recoverable`]: a
    /// recoverable error that still reached the CLI means retries were
    /// exhausted, which we report as a temporary failure rather than a hard
    /// error so scripts can distinguish "try again later" from "fix your
    /// input".
    pub fn from_upload_error(error: &UploadError) -> Self {
        match error.kind() {
            ErrorKind::Validation => ExitCode::DataError,
            ErrorKind::Network => {
                if error.is_recoverable() {
                    ExitCode::TempFail
                } else {
                    ExitCode::Unavailable
                }
            }
            ErrorKind::Server => ExitCode::Protocol,
            ErrorKind::Storage => ExitCode::IoError,
            ErrorKind::Unknown => Self::from_error(error),
        }
    }

    /// Generic fallback mapping for errors outside the upload domain
    /// (CLI parsing, configuration loading, platform errors).
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let error_string = error.to_string().to_lowercase();

        if error_string.contains("permission") || error_string.contains("access denied") {
            ExitCode::NoPerm
        } else if error_string.contains("not found") || error_string.contains("no such") {
            ExitCode::NoInput
        } else if error_string.contains("invalid") || error_string.contains("argument") {
            ExitCode::UsageError
        } else if error_string.contains("parse") || error_string.contains("format") {
            ExitCode::DataError
        } else if error_string.contains("config") {
            ExitCode::Config
        } else if error_string.contains("io") || error_string.contains("read") || error_string.contains("write") {
            ExitCode::IoError
        } else if error_string.contains("unavailable") || error_string.contains("not available") {
            ExitCode::Unavailable
        } else {
            ExitCode::Error
        }
    }

    /// Get human-readable description of exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::Unavailable => "Upload endpoint unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::OsError => "Local storage error",
            ExitCode::CantCreate => "Cannot create output file",
            ExitCode::IoError => "I/O error",
            ExitCode::TempFail => "Temporary failure, retry",
            ExitCode::Protocol => "Remote error in protocol",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Map a generic application result to a process exit code.
pub fn result_to_exit_code<T, E: std::error::Error>(result: &Result<T, E>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::Success,
        Err(e) => ExitCode::from_error(e),
    }
}

/// Map an [`UploadError`] directly to its exit code.
pub fn map_error_to_exit_code(error: &UploadError) -> ExitCode {
    ExitCode::from_upload_error(error)
}
