// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resumable Upload Engine
//!
//! A client-side, resumable, chunked file upload engine. The domain crate
//! (`resumable_upload_domain`) defines the pure core -- value objects,
//! entities, and the service ports; this crate binds concrete adapters to
//! those ports and assembles them into the running pipeline.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Presentation Layer                       │
//! │  (CLI commands, progress/error callbacks)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (UploadManager, QueueScheduler)                             │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! │  (resumable_upload_domain: entities, value objects, ports)   │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  (chunkers, compression, encryption, state store, sink)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## File Format Support
//!
//! Chunking adapts to the source file type: fixed-size byte windows for
//! binary files, row-batched chunks for CSV and spreadsheet files so a
//! chunk boundary never splits a logical record.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use resumable_upload_domain::{
    ChunkKey, ChunkSize, FileChunk, FileId, UploadError, UploadResult, UploadState, UploadStatus,
};

pub use crate::application::upload_manager::UploadManager;
pub use crate::application::queue_scheduler::QueueScheduler;
pub use crate::infrastructure::config::EngineConfig;
