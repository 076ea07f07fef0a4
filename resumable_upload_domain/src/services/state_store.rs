// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Store Port (C6)
//!
//! Durable persistence for [`UploadState`] and [`ChunkState`]. This is an
//! I/O-bound infrastructure port, following the same async-trait pattern as
//! [`crate::services::chunker`]; the in-memory write-through cache and
//! autosave loop are an infrastructure runtime concern layered on top of
//! whichever concrete adapter is bound.

use crate::entities::{ChunkState, UploadState};
use crate::value_objects::FileId;
use crate::UploadError;
use async_trait::async_trait;

pub fn upload_state_key(file_id: FileId) -> String {
    format!("upload_state_{file_id}")
}

pub fn chunk_state_key(file_id: FileId, index: u64) -> String {
    format!("chunk_state_{file_id}_{index}")
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_upload_state(&self, state: &UploadState) -> Result<(), UploadError>;
    async fn load_upload_state(&self, file_id: FileId) -> Result<Option<UploadState>, UploadError>;
    async fn remove_upload_state(&self, file_id: FileId) -> Result<(), UploadError>;

    async fn save_chunk_state(&self, file_id: FileId, state: &ChunkState) -> Result<(), UploadError>;
    async fn load_chunk_state(&self, file_id: FileId, index: u64) -> Result<Option<ChunkState>, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_persisted_schema() {
        let id = FileId::new();
        assert_eq!(upload_state_key(id), format!("upload_state_{id}"));
        assert_eq!(chunk_state_key(id, 7), format!("chunk_state_{id}_7"));
    }
}
