// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Write-Through State Cache (C6, caching decorator)
//!
//! Wraps any [`StateStore`] backend with an in-memory map that every read
//! consults first and every write updates alongside the backend. A periodic
//! autosave task re-flushes the in-memory upload states to the backend on a
//! fixed interval as a second line of defense against a backend write that
//! silently failed to apply -- per the spec, autosave failures are logged,
//! never propagated to the caller mid-upload.

use async_trait::async_trait;
use dashmap::DashMap;
use resumable_upload_domain::services::StateStore;
use resumable_upload_domain::value_objects::FileId;
use resumable_upload_domain::{ChunkState, UploadError, UploadState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Write-through cache over an inner [`StateStore`]. Every `save_*` call
/// writes to the backend first, then updates the in-memory copy; every
/// `load_*` call checks memory before touching the backend.
pub struct CachingStateStore<S: StateStore + 'static> {
    inner: Arc<S>,
    upload_cache: DashMap<FileId, UploadState>,
    chunk_cache: DashMap<(FileId, u64), ChunkState>,
}

impl<S: StateStore + 'static> CachingStateStore<S> {
    pub fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            upload_cache: DashMap::new(),
            chunk_cache: DashMap::new(),
        })
    }

    /// Spawns the autosave loop: every `interval`, re-persists every
    /// in-memory upload state to the backend. A write failure is logged at
    /// warn and skipped -- it does not fail the upload the state belongs to,
    /// and the next tick will simply try again.
    pub fn spawn_autosave(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                for entry in store.upload_cache.iter() {
                    let state = entry.value();
                    if let Err(e) = store.inner.save_upload_state(state).await {
                        tracing::warn!(file_id = %state.file_id, error = %e, "autosave failed to persist upload state");
                    }
                }
            }
        })
    }
}

#[async_trait]
impl<S: StateStore + 'static> StateStore for CachingStateStore<S> {
    async fn save_upload_state(&self, state: &UploadState) -> Result<(), UploadError> {
        self.inner.save_upload_state(state).await?;
        self.upload_cache.insert(state.file_id, state.clone());
        Ok(())
    }

    async fn load_upload_state(&self, file_id: FileId) -> Result<Option<UploadState>, UploadError> {
        if let Some(cached) = self.upload_cache.get(&file_id) {
            return Ok(Some(cached.clone()));
        }
        let loaded = self.inner.load_upload_state(file_id).await?;
        if let Some(state) = &loaded {
            self.upload_cache.insert(file_id, state.clone());
        }
        Ok(loaded)
    }

    async fn remove_upload_state(&self, file_id: FileId) -> Result<(), UploadError> {
        self.inner.remove_upload_state(file_id).await?;
        self.upload_cache.remove(&file_id);
        self.chunk_cache.retain(|(id, _), _| *id != file_id);
        Ok(())
    }

    async fn save_chunk_state(&self, file_id: FileId, state: &ChunkState) -> Result<(), UploadError> {
        self.inner.save_chunk_state(file_id, state).await?;
        self.chunk_cache.insert((file_id, state.index), state.clone());
        Ok(())
    }

    async fn load_chunk_state(&self, file_id: FileId, index: u64) -> Result<Option<ChunkState>, UploadError> {
        if let Some(cached) = self.chunk_cache.get(&(file_id, index)) {
            return Ok(Some(cached.clone()));
        }
        let loaded = self.inner.load_chunk_state(file_id, index).await?;
        if let Some(state) = &loaded {
            self.chunk_cache.insert((file_id, index), state.clone());
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::state_store_memory::MemoryStateStore;
    use resumable_upload_domain::value_objects::MimeType;

    fn sample_state() -> UploadState {
        UploadState::new(
            FileId::new(),
            "a.bin",
            100,
            MimeType::sanitize("application/octet-stream"),
            1,
            "deadbeef".to_string(),
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn reads_are_served_from_memory_after_a_write() {
        let backend = Arc::new(MemoryStateStore::new());
        let cache = CachingStateStore::new(backend);
        let state = sample_state();
        cache.save_upload_state(&state).await.unwrap();
        assert!(cache.upload_cache.contains_key(&state.file_id));
        let loaded = cache.load_upload_state(state.file_id).await.unwrap().unwrap();
        assert_eq!(loaded.file_id, state.file_id);
    }

    #[tokio::test]
    async fn a_cold_read_falls_through_to_the_backend_and_then_caches() {
        let backend = Arc::new(MemoryStateStore::new());
        let state = sample_state();
        backend.save_upload_state(&state).await.unwrap();

        let cache = CachingStateStore::new(backend);
        assert!(!cache.upload_cache.contains_key(&state.file_id));
        let loaded = cache.load_upload_state(state.file_id).await.unwrap();
        assert!(loaded.is_some());
        assert!(cache.upload_cache.contains_key(&state.file_id));
    }

    #[tokio::test]
    async fn removing_clears_both_the_upload_and_chunk_cache() {
        let backend = Arc::new(MemoryStateStore::new());
        let cache = CachingStateStore::new(backend);
        let state = sample_state();
        cache.save_upload_state(&state).await.unwrap();
        let chunk = ChunkState::new(0, 100, 0, "abc".to_string());
        cache.save_chunk_state(state.file_id, &chunk).await.unwrap();

        cache.remove_upload_state(state.file_id).await.unwrap();
        assert!(cache.load_upload_state(state.file_id).await.unwrap().is_none());
        assert!(cache.load_chunk_state(state.file_id, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn autosave_flushes_in_memory_state_to_the_backend() {
        let backend = Arc::new(MemoryStateStore::new());
        let cache = CachingStateStore::new(Arc::clone(&backend));
        let state = sample_state();
        cache.upload_cache.insert(state.file_id, state.clone());

        let handle = cache.spawn_autosave(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(backend.load_upload_state(state.file_id).await.unwrap().is_some());
    }
}
