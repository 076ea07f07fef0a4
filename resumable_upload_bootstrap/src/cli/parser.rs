// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap.
//!
//! This module defines the CLI structure and handles argument parsing.
//! Security validation happens in the validator module after parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "resumable-upload")]
#[command(about = concat!("Resumable chunked file upload engine v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    // === Resource Configuration Flags ===
    // These flags feed the ResourceAccountant (C9) and worker pool (C5): they
    // bound how much of the host's memory and concurrency an upload may use,
    // independent of whatever defaults the config file specifies.
    /// Override worker pool size (concurrent chunk upload workers)
    ///
    /// Default: taken from the `concurrency.worker_pool_size` config key.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override maximum concurrently open streams / chunk buffers
    ///
    /// Default: taken from the `resources.max_open_streams` config key.
    #[arg(long)]
    pub concurrent_streams: Option<usize>,

    /// Override the resource accountant's memory budget, in megabytes
    ///
    /// Default: taken from the `resources.max_memory_bytes` config key.
    #[arg(long)]
    pub max_memory_mb: Option<usize>,

    /// Bounded channel depth between chunker, transform stage, and sink (C10)
    ///
    /// Lower values reduce memory usage but can stall the pipeline; higher
    /// values buffer more chunks in flight at the cost of memory.
    #[arg(long, default_value = "4")]
    pub channel_depth: usize,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Upload a file, chunking, compressing, and optionally encrypting it as
    /// it streams to the configured endpoint
    Upload {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Upload endpoint base URL (overrides `endpoint.base_url` in config)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Chunk size in MB
        #[arg(long)]
        chunk_size_mb: Option<usize>,

        /// Scheduling priority for this upload relative to others already
        /// queued (higher runs first)
        #[arg(long, default_value = "0")]
        priority: i32,

        /// Encrypt each chunk with AES-GCM before it leaves this process
        #[arg(long)]
        encrypt: bool,
    },

    /// Resume a previously paused or interrupted upload from its last
    /// acknowledged chunk
    Resume {
        /// File identifier (ULID) reported when the upload was started
        file_id: String,
    },

    /// Pause an in-progress upload, persisting its resume state
    Pause {
        /// File identifier (ULID) of the upload to pause
        file_id: String,
    },

    /// Cancel an upload and discard its persisted resume state
    Cancel {
        /// File identifier (ULID) of the upload to cancel
        file_id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show the status of a single upload
    Status {
        /// File identifier (ULID) of the upload to inspect
        file_id: String,
    },

    /// List all uploads known to the queue scheduler (C12), most urgent first
    List,

    /// Validate an engine configuration file without starting an upload
    Validate {
        /// Configuration file to validate
        config: PathBuf,
    },
}

/// Parse CLI arguments
///
/// # Panics
///
/// Clap will exit the process with appropriate error message if parsing
/// fails.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload_command() {
        let cli = Cli::parse_from(["resumable-upload", "upload", "--input", "/tmp/file.csv"]);
        match cli.command {
            Commands::Upload { input, .. } => assert_eq!(input, PathBuf::from("/tmp/file.csv")),
            other => panic!("expected Upload, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_resume_command() {
        let cli = Cli::parse_from(["resumable-upload", "resume", "01ARZ3NDEKTSV4RRFFQ69G5FAV"]);
        match cli.command {
            Commands::Resume { file_id } => assert_eq!(file_id, "01ARZ3NDEKTSV4RRFFQ69G5FAV"),
            other => panic!("expected Resume, got {other:?}"),
        }
    }

    #[test]
    fn test_default_channel_depth() {
        let cli = Cli::parse_from(["resumable-upload", "list"]);
        assert_eq!(cli.channel_depth, 4);
    }
}
