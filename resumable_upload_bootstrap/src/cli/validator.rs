// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure Command-Line Argument Parsing
//!
//! Security-first argument validation, applied after clap has already parsed
//! the `Cli` structure. clap handles syntax (flags, types, subcommand
//! dispatch); this module re-checks every string that ultimately reaches the
//! filesystem or the upload ID space for injection and traversal attempts.
//!
//! ## Security Features
//!
//! - **Length limits** - Prevent buffer overflow / DoS via giant arguments
//! - **Pattern detection** - Block path traversal and shell injection
//! - **Path normalization** - Canonical path resolution
//! - **System directory protection** - Prevent access to sensitive paths
//!
//! ## Dangerous Patterns Detected
//!
//! - `..` - Path traversal
//! - `~` - Home directory expansion
//! - `$` - Variable expansion
//! - Backticks - Command substitution
//! - `;` `&` `|` - Command chaining
//! - `>` `<` - Redirection
//! - Null bytes, newlines, carriage returns

use crate::cli::parser::Commands;
use crate::config::{AppConfig, LogLevel};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum argument count (prevent DOS)
const MAX_ARG_COUNT: usize = 100;

/// Maximum single argument length
const MAX_ARG_LENGTH: usize = 1000;

/// Maximum path length
const MAX_PATH_LENGTH: usize = 4096;

/// Dangerous patterns that indicate potential attacks
const DANGEROUS_PATTERNS: &[&str] = &[
    "..", // Path traversal
    "~",  // Home directory
    "$",  // Variable expansion
    "`",  // Command substitution
    ";",  // Command chaining
    "&",  // Background/AND
    "|",  // Pipe
    ">",  // Redirect output
    "<",  // Redirect input
    "\n", // Newline
    "\r", // Carriage return
    "\0", // Null byte
];

/// Protected system directories
const PROTECTED_DIRS: &[&str] = &[
    "/etc",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/boot",
    "/sys",
    "/proc",
    "/dev",
];

/// Secure argument parsing errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Too many arguments (max {MAX_ARG_COUNT})")]
    TooManyArguments,

    #[error("Argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("Dangerous pattern detected in argument: {pattern} in {arg}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("Path exceeds maximum length (max {MAX_PATH_LENGTH})")]
    PathTooLong,

    #[error("Access to protected system directory denied: {0}")]
    ProtectedDirectory(String),

    #[error("Path does not exist: {0}")]
    PathNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    /// A file identifier did not parse as a ULID
    #[error("Invalid file identifier '{0}': must be a ULID")]
    InvalidFileId(String),
}

/// Secure argument parser
pub struct SecureArgParser;

impl SecureArgParser {
    /// Validate the raw process arguments before clap even sees them.
    ///
    /// This only guards against pathological input (argument-count DoS,
    /// absurdly long single arguments); per-value semantic checks (paths,
    /// file IDs, numeric ranges) happen in [`Self::validate_command`] once
    /// clap has parsed them into typed fields.
    pub fn validate_raw_args(args: &[String]) -> Result<(), ParseError> {
        if args.len() > MAX_ARG_COUNT {
            return Err(ParseError::TooManyArguments);
        }
        Ok(())
    }

    /// Validate a single argument for security issues
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(
                arg.chars().take(50).collect::<String>() + "...",
            ));
        }

        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern {
                    pattern: pattern.to_string(),
                    arg: arg.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validate and canonicalize a file path
    pub fn validate_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path).map_err(|e| match e {
            ParseError::ArgumentTooLong(_) => ParseError::InvalidPath(format!("Path too long: {path}")),
            ParseError::DangerousPattern { pattern, .. } => {
                ParseError::InvalidPath(format!("Path contains dangerous pattern '{pattern}': {path}"))
            }
            other => other,
        })?;

        let path_obj = Path::new(path);

        let canonical = path_obj.canonicalize().map_err(|e| {
            if !path_obj.exists() {
                ParseError::PathNotFound(path.to_string())
            } else {
                ParseError::InvalidPath(format!("{path}: {e}"))
            }
        })?;

        if canonical.to_string_lossy().len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }

        for protected in PROTECTED_DIRS {
            if canonical.starts_with(protected) {
                return Err(ParseError::ProtectedDirectory(canonical.display().to_string()));
            }
        }

        Ok(canonical)
    }

    /// Validate an optional path (may be `None`)
    pub fn validate_optional_path(path: Option<&str>) -> Result<Option<PathBuf>, ParseError> {
        match path {
            Some(p) => Self::validate_path(p).map(Some),
            None => Ok(None),
        }
    }

    /// Validate a number argument against an inclusive range
    pub fn validate_number<T>(arg_name: &str, value: &str, min: Option<T>, max: Option<T>) -> Result<T, ParseError>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display,
    {
        Self::validate_argument(value)?;

        let num = value.parse::<T>().map_err(|_| ParseError::InvalidValue {
            arg: arg_name.to_string(),
            reason: format!("Not a valid number: {value}"),
        })?;

        if let Some(min_val) = min {
            if num < min_val {
                return Err(ParseError::InvalidValue {
                    arg: arg_name.to_string(),
                    reason: format!("Value {value} is less than minimum {min_val}"),
                });
            }
        }

        if let Some(max_val) = max {
            if num > max_val {
                return Err(ParseError::InvalidValue {
                    arg: arg_name.to_string(),
                    reason: format!("Value {value} is greater than maximum {max_val}"),
                });
            }
        }

        Ok(num)
    }

    /// Validate a file identifier argument (a ULID as produced by
    /// [`resumable_upload_domain::FileId`]).
    pub fn validate_file_id(raw: &str) -> Result<String, ParseError> {
        Self::validate_argument(raw)?;
        resumable_upload_domain::FileId::from_str(raw)
            .map(|_| raw.to_string())
            .map_err(|_| ParseError::InvalidFileId(raw.to_string()))
    }

    /// Validate every path- or identifier-shaped field of a parsed subcommand.
    ///
    /// Returns the canonicalized input path when the command carries one, so
    /// callers don't re-resolve it.
    pub fn validate_command(command: &Commands) -> Result<Option<PathBuf>, ParseError> {
        match command {
            Commands::Upload {
                input,
                endpoint,
                chunk_size_mb,
                ..
            } => {
                let canonical = Self::validate_path(
                    input
                        .to_str()
                        .ok_or_else(|| ParseError::InvalidPath("input path is not valid UTF-8".into()))?,
                )?;
                if let Some(endpoint) = endpoint {
                    Self::validate_argument(endpoint)?;
                }
                if let Some(size) = chunk_size_mb {
                    Self::validate_number("chunk-size-mb", &size.to_string(), Some(1u64), Some(512u64))?;
                }
                Ok(Some(canonical))
            }
            Commands::Resume { file_id } | Commands::Pause { file_id } | Commands::Status { file_id } => {
                Self::validate_file_id(file_id)?;
                Ok(None)
            }
            Commands::Cancel { file_id, .. } => {
                Self::validate_file_id(file_id)?;
                Ok(None)
            }
            Commands::List => Ok(None),
            Commands::Validate { config } => Ok(Some(Self::validate_path(
                config
                    .to_str()
                    .ok_or_else(|| ParseError::InvalidPath("config path is not valid UTF-8".into()))?,
            )?)),
        }
    }

    /// Build the bootstrap-phase [`AppConfig`] from a parsed, security-checked
    /// `Cli`. Call [`Self::validate_command`] first.
    pub fn build_app_config(cli: &crate::cli::parser::Cli, input_path: Option<PathBuf>) -> AppConfig {
        let log_level = LogLevel::resolve(cli.verbose, None);
        let mut builder = AppConfig::builder()
            .app_name("resumable-upload")
            .log_level(log_level)
            .verbose(cli.verbose);

        if let Some(path) = input_path {
            builder = builder.input_path(path);
        }
        if let Some(config) = &cli.config {
            builder = builder.config_path(config.clone());
        }
        if let Some(workers) = cli.workers {
            builder = builder.worker_threads(workers);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod argument_validation {
        use super::*;

        #[test]
        fn accepts_safe_arguments() {
            assert!(SecureArgParser::validate_argument("safe-arg").is_ok());
            assert!(SecureArgParser::validate_argument("file.txt").is_ok());
            assert!(SecureArgParser::validate_argument("path/to/file").is_ok());
        }

        #[test]
        fn rejects_too_long_arguments() {
            let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
            assert!(matches!(
                SecureArgParser::validate_argument(&long_arg),
                Err(ParseError::ArgumentTooLong(_))
            ));
        }

        #[test]
        fn detects_dangerous_patterns() {
            let dangerous = vec![
                "../etc/passwd",
                "~/.ssh/id_rsa",
                "$(whoami)",
                "`ls`",
                "file;rm -rf /",
                "file&background",
                "file|pipe",
                "file>output",
                "file<input",
                "file\nwith\nnewlines",
            ];

            for arg in dangerous {
                assert!(
                    matches!(
                        SecureArgParser::validate_argument(arg),
                        Err(ParseError::DangerousPattern { .. })
                    ),
                    "Failed to detect dangerous pattern in: {arg}"
                );
            }
        }
    }

    mod number_validation {
        use super::*;

        #[test]
        fn validates_valid_numbers() {
            let result = SecureArgParser::validate_number::<u32>("workers", "8", Some(1), Some(16));
            assert_eq!(result.unwrap(), 8);
        }

        #[test]
        fn rejects_invalid_numbers() {
            let result = SecureArgParser::validate_number::<u32>("workers", "abc", None, None);
            assert!(matches!(result, Err(ParseError::InvalidValue { .. })));
        }

        #[test]
        fn enforces_range_constraints() {
            let result = SecureArgParser::validate_number::<u32>("workers", "100", Some(1), Some(16));
            assert!(matches!(result, Err(ParseError::InvalidValue { .. })));

            let result = SecureArgParser::validate_number::<u32>("workers", "0", Some(1), Some(16));
            assert!(matches!(result, Err(ParseError::InvalidValue { .. })));
        }
    }

    mod file_id_validation {
        use super::*;

        #[test]
        fn accepts_valid_ulid() {
            let id = resumable_upload_domain::FileId::new().to_string();
            assert!(SecureArgParser::validate_file_id(&id).is_ok());
        }

        #[test]
        fn rejects_non_ulid() {
            assert!(matches!(
                SecureArgParser::validate_file_id("not-a-ulid"),
                Err(ParseError::InvalidFileId(_))
            ));
        }

        #[test]
        fn rejects_dangerous_file_id() {
            assert!(SecureArgParser::validate_file_id("../../etc/passwd").is_err());
        }
    }

    mod raw_args {
        use super::*;

        #[test]
        fn accepts_normal_arg_counts() {
            let args = vec!["program".to_string()];
            assert!(SecureArgParser::validate_raw_args(&args).is_ok());
        }

        #[test]
        fn rejects_too_many_arguments() {
            let args = vec!["arg".to_string(); MAX_ARG_COUNT + 1];
            assert!(matches!(
                SecureArgParser::validate_raw_args(&args),
                Err(ParseError::TooManyArguments)
            ));
        }
    }

    mod command_validation {
        use super::*;
        use crate::cli::parser::Commands;

        #[test]
        fn rejects_dangerous_file_id_in_resume() {
            let command = Commands::Resume {
                file_id: "../etc/passwd".to_string(),
            };
            assert!(SecureArgParser::validate_command(&command).is_err());
        }

        #[test]
        fn list_has_nothing_to_validate() {
            assert_eq!(SecureArgParser::validate_command(&Commands::List).unwrap(), None);
        }
    }
}
