// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload State
//!
//! `UploadState` is the persisted entity tracking one file's progress
//! through the engine. Unlike the value objects in [`crate::value_objects`]
//! it has identity (`file_id`) and mutates in place as chunks complete --
//! this is the "Entity" half of the DDD value-object/entity split.
//!
//! ## Invariants
//!
//! - `uploaded_chunks ⊆ {0..total_chunks-1}`
//! - `bytes_uploaded == Σ chunk_size(i) for i in uploaded_chunks`
//! - `status == Completed` iff `uploaded_chunks == {0..total_chunks-1}`

use crate::value_objects::{FileId, MimeType, ResumeToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Initialized,
    Uploading,
    Paused,
    Interrupted,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadState {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: MimeType,
    pub total_chunks: u64,
    uploaded_chunks: BTreeSet<u64>,
    /// Per-chunk byte size, needed to keep `bytes_uploaded` correct without
    /// re-deriving it from an external chunk list.
    chunk_sizes: BTreeMap<u64, u64>,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub bytes_uploaded: u64,
    pub status: UploadStatus,
    pub resume_token: ResumeToken,
    pub checksum: String,
    pub error: Option<String>,
}

impl UploadState {
    pub fn new(
        file_id: FileId,
        file_name: impl Into<String>,
        file_size: u64,
        mime_type: MimeType,
        total_chunks: u64,
        checksum: String,
        now: DateTime<Utc>,
    ) -> Self {
        UploadState {
            file_id,
            file_name: file_name.into(),
            file_size,
            mime_type,
            total_chunks,
            uploaded_chunks: BTreeSet::new(),
            chunk_sizes: BTreeMap::new(),
            start_time: now,
            last_update_time: now,
            bytes_uploaded: 0,
            status: UploadStatus::Initialized,
            resume_token: ResumeToken::new(),
            checksum,
            error: None,
        }
    }

    pub fn uploaded_chunks(&self) -> &BTreeSet<u64> {
        &self.uploaded_chunks
    }

    /// Returns `{0..total_chunks-1} \ uploaded_chunks`, the chunks a resumed
    /// upload still needs to send.
    pub fn resumable_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks).filter(|i| !self.uploaded_chunks.contains(i)).collect()
    }

    pub fn can_resume(&self) -> bool {
        matches!(
            self.status,
            UploadStatus::Initialized | UploadStatus::Uploading | UploadStatus::Paused | UploadStatus::Interrupted
        )
    }

    /// Records a chunk as uploaded, keeping `bytes_uploaded` consistent. A
    /// repeated mark for the same index is a no-op (idempotent under
    /// at-least-once chunk delivery).
    pub fn mark_chunk_uploaded(&mut self, index: u64, chunk_size: u64, now: DateTime<Utc>) {
        if self.uploaded_chunks.insert(index) {
            self.chunk_sizes.insert(index, chunk_size);
            self.bytes_uploaded += chunk_size;
        }
        self.last_update_time = now;
        if self.uploaded_chunks.len() as u64 == self.total_chunks {
            self.status = UploadStatus::Completed;
        } else if self.status == UploadStatus::Initialized {
            self.status = UploadStatus::Uploading;
        }
    }

    pub fn transition_to(&mut self, status: UploadStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_update_time = now;
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.error = Some(error.into());
        self.status = UploadStatus::Error;
        self.last_update_time = now;
    }

    pub fn is_complete(&self) -> bool {
        self.status == UploadStatus::Completed
    }
}
