// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse_cli()             │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validator::SecureArgParser      │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `parser` - CLI structure and clap parsing
//! - `validator` - Security validation layer

pub mod parser;
pub mod validator;

use crate::config::AppConfig;
use std::path::PathBuf;

pub use validator::ParseError;

/// Security-validated, ready-to-run subcommand.
///
/// Mirrors [`parser::Commands`] but with every path canonicalized and every
/// file identifier confirmed to parse as a ULID, so the composition root
/// never has to re-validate user input before touching the filesystem.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Upload {
        input: PathBuf,
        endpoint: Option<String>,
        chunk_size_mb: Option<usize>,
        priority: i32,
        encrypt: bool,
    },
    Resume {
        file_id: String,
    },
    Pause {
        file_id: String,
    },
    Cancel {
        file_id: String,
        force: bool,
    },
    Status {
        file_id: String,
    },
    List,
    Validate {
        config: PathBuf,
    },
}

/// Fully parsed and validated command line, ready to drive the composition
/// root.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub app_config: AppConfig,
    pub concurrent_streams: Option<usize>,
    pub max_memory_mb: Option<usize>,
    pub channel_depth: usize,
}

impl ValidatedCli {
    pub fn is_verbose(&self) -> bool {
        self.app_config.is_verbose()
    }
}

/// Parse `std::env::args()` with clap, then run every argument through
/// [`validator::SecureArgParser`].
///
/// clap's own `--help` / `--version` handling still exits the process before
/// this function returns, as usual.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let raw: Vec<String> = std::env::args().collect();
    validator::SecureArgParser::validate_raw_args(&raw)?;

    let cli = parser::parse_cli();
    parse_and_validate_from(cli)
}

/// Testable core of [`parse_and_validate`], taking an already-parsed `Cli`.
fn parse_and_validate_from(cli: parser::Cli) -> Result<ValidatedCli, ParseError> {
    let canonical_path = validator::SecureArgParser::validate_command(&cli.command)?;

    let command = match cli.command.clone() {
        parser::Commands::Upload {
            endpoint,
            chunk_size_mb,
            priority,
            encrypt,
            ..
        } => ValidatedCommand::Upload {
            input: canonical_path
                .clone()
                .ok_or_else(|| ParseError::MissingArgument("input".into()))?,
            endpoint,
            chunk_size_mb,
            priority,
            encrypt,
        },
        parser::Commands::Resume { file_id } => ValidatedCommand::Resume { file_id },
        parser::Commands::Pause { file_id } => ValidatedCommand::Pause { file_id },
        parser::Commands::Cancel { file_id, force } => ValidatedCommand::Cancel { file_id, force },
        parser::Commands::Status { file_id } => ValidatedCommand::Status { file_id },
        parser::Commands::List => ValidatedCommand::List,
        parser::Commands::Validate { .. } => ValidatedCommand::Validate {
            config: canonical_path.ok_or_else(|| ParseError::MissingArgument("config".into()))?,
        },
    };

    let app_config = validator::SecureArgParser::build_app_config(
        &cli,
        match &command {
            ValidatedCommand::Upload { input, .. } => Some(input.clone()),
            _ => None,
        },
    );

    Ok(ValidatedCli {
        command,
        app_config,
        concurrent_streams: cli.concurrent_streams,
        max_memory_mb: cli.max_memory_mb,
        channel_depth: cli.channel_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn rejects_dangerous_file_id() {
        let cli = parser::Cli::parse_from(["resumable-upload", "resume", "../etc/passwd"]);
        assert!(parse_and_validate_from(cli).is_err());
    }

    #[test]
    fn accepts_list_command() {
        let cli = parser::Cli::parse_from(["resumable-upload", "list"]);
        let validated = parse_and_validate_from(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::List));
    }

    #[test]
    fn accepts_valid_file_id_for_pause() {
        let id = resumable_upload_domain::FileId::new().to_string();
        let cli = parser::Cli::parse_from(["resumable-upload", "pause", &id]);
        let validated = parse_and_validate_from(cli).unwrap();
        match validated.command {
            ValidatedCommand::Pause { file_id } => assert_eq!(file_id, id),
            other => panic!("expected Pause, got {other:?}"),
        }
    }
}
