// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory State Store (C6, "simple synchronous session store" adapter)
//!
//! A `DashMap<String, String>` keyed exactly as the spec's persisted state
//! layout describes (`upload_state_{fileId}`, `chunk_state_{fileId}_{index}`),
//! values UTF-8 JSON. Useful for tests, single-process CLIs that don't need
//! durability across restarts, and as the session-scoped half of
//! [`crate::infrastructure::runtime::caching_state_store`]'s write-through
//! cache when no durable backend is configured.

use async_trait::async_trait;
use dashmap::DashMap;
use resumable_upload_domain::services::{chunk_state_key, upload_state_key, StateStore};
use resumable_upload_domain::value_objects::FileId;
use resumable_upload_domain::{ChunkState, UploadError, UploadState};

#[derive(Default)]
pub struct MemoryStateStore {
    entries: DashMap<String, String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save_upload_state(&self, state: &UploadState) -> Result<(), UploadError> {
        let json = serde_json::to_string(state)?;
        self.entries.insert(upload_state_key(state.file_id), json);
        Ok(())
    }

    async fn load_upload_state(&self, file_id: FileId) -> Result<Option<UploadState>, UploadError> {
        match self.entries.get(&upload_state_key(file_id)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn remove_upload_state(&self, file_id: FileId) -> Result<(), UploadError> {
        self.entries.remove(&upload_state_key(file_id));
        Ok(())
    }

    async fn save_chunk_state(&self, file_id: FileId, state: &ChunkState) -> Result<(), UploadError> {
        let json = serde_json::to_string(state)?;
        self.entries.insert(chunk_state_key(file_id, state.index), json);
        Ok(())
    }

    async fn load_chunk_state(&self, file_id: FileId, index: u64) -> Result<Option<ChunkState>, UploadError> {
        match self.entries.get(&chunk_state_key(file_id, index)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resumable_upload_domain::value_objects::MimeType;

    #[tokio::test]
    async fn round_trips_upload_state_through_json() {
        let store = MemoryStateStore::new();
        let state = UploadState::new(
            FileId::new(),
            "a.bin",
            100,
            MimeType::sanitize("application/octet-stream"),
            1,
            "deadbeef".to_string(),
            chrono::Utc::now(),
        );
        store.save_upload_state(&state).await.unwrap();
        let loaded = store.load_upload_state(state.file_id).await.unwrap().unwrap();
        assert_eq!(loaded.file_id, state.file_id);
        assert_eq!(loaded.file_name, state.file_name);
    }

    #[tokio::test]
    async fn removed_state_is_no_longer_found() {
        let store = MemoryStateStore::new();
        let state = UploadState::new(
            FileId::new(),
            "a.bin",
            100,
            MimeType::sanitize("application/octet-stream"),
            1,
            "deadbeef".to_string(),
            chrono::Utc::now(),
        );
        store.save_upload_state(&state).await.unwrap();
        store.remove_upload_state(state.file_id).await.unwrap();
        assert!(store.load_upload_state(state.file_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunk_state_is_keyed_per_file_and_index() {
        let store = MemoryStateStore::new();
        let file_id = FileId::new();
        let chunk = ChunkState::new(3, 1024, 3072, "abc123".to_string());
        store.save_chunk_state(file_id, &chunk).await.unwrap();
        let loaded = store.load_chunk_state(file_id, 3).await.unwrap().unwrap();
        assert_eq!(loaded.index, 3);
        assert!(store.load_chunk_state(file_id, 4).await.unwrap().is_none());
    }
}
