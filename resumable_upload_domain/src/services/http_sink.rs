// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Sink Port (C10 destination)
//!
//! The pipeline's terminal stage hands each processed chunk to a sink. The
//! reqwest-based multipart adapter lives in the infrastructure crate; tests
//! exercise this port against an in-memory stub.

use crate::value_objects::{FileId, MimeType, ResumeToken};
use crate::UploadError;
use async_trait::async_trait;

/// Everything the sink's multipart form needs to build one chunk POST. The
/// `resume_token` field is `None` when resumability is disabled, per the
/// external interface's "present iff resumability enabled" rule for the
/// corresponding form field.
#[derive(Debug, Clone)]
pub struct ChunkUploadRequest {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: MimeType,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub is_final: bool,
    pub payload: Vec<u8>,
    /// SHA-256 hex of the pre-encryption chunk payload.
    pub checksum: String,
    pub resume_token: Option<ResumeToken>,
}

#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload_chunk(&self, request: ChunkUploadRequest) -> Result<(), UploadError>;
}
