// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resumable Upload Domain
//!
//! The pure core of the upload engine: value objects, entities, domain
//! services, and the error taxonomy they all share. Nothing in this crate
//! performs file, network, or clock I/O directly -- that belongs to the
//! infrastructure crate's adapters, bound against the `async_trait` ports
//! declared in [`services`].

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

pub use entities::{
    ChunkState, ProgressEvent, QueueItem, QueueStatus, ResourceStats, ResourceType, UploadStats, UploadState, UploadStatus,
};
pub use error::{ErrorKind, ErrorSeverity, UploadError, UploadResult};
pub use value_objects::{AccessToken, ChunkKey, ChunkPayload, ChunkSize, ChunkTotal, FileChunk, FileId, FileKey, MimeType, ResumeToken, Row};
