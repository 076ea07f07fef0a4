// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite State Store (C6, "transactional local database" adapter)
//!
//! The durable half of the state store: a single `upload_kv` table keyed
//! exactly as the in-memory adapter, so both adapters satisfy the same
//! persisted layout. Every write goes through an explicit transaction so a
//! crash mid-write can never leave a half-updated row behind, matching the
//! "each `saveState` call is atomic with respect to readers" ordering
//! guarantee.

use async_trait::async_trait;
use resumable_upload_domain::services::{chunk_state_key, upload_state_key, StateStore};
use resumable_upload_domain::value_objects::FileId;
use resumable_upload_domain::{ChunkState, UploadError, UploadState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Opens (creating if needed) the sqlite database at `url`, e.g.
    /// `"sqlite://resumable_upload.db?mode=rwc"`, and ensures the key/value
    /// table exists.
    pub async fn connect(url: &str) -> Result<Self, UploadError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to open sqlite state store: {e}")))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), UploadError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS upload_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| UploadError::Storage(format!("failed to create upload_kv table: {e}")))?;
        Ok(())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), UploadError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| UploadError::Storage(format!("failed to start transaction: {e}")))?;
        sqlx::query("INSERT INTO upload_kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to write state: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| UploadError::Storage(format!("failed to commit state write: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, UploadError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM upload_kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to read state: {e}")))?;
        Ok(row.map(|(v,)| v))
    }

    async fn delete(&self, key: &str) -> Result<(), UploadError> {
        sqlx::query("DELETE FROM upload_kv WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to delete state: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save_upload_state(&self, state: &UploadState) -> Result<(), UploadError> {
        let json = serde_json::to_string(state)?;
        self.put(&upload_state_key(state.file_id), &json).await
    }

    async fn load_upload_state(&self, file_id: FileId) -> Result<Option<UploadState>, UploadError> {
        match self.get(&upload_state_key(file_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn remove_upload_state(&self, file_id: FileId) -> Result<(), UploadError> {
        self.delete(&upload_state_key(file_id)).await
    }

    async fn save_chunk_state(&self, file_id: FileId, state: &ChunkState) -> Result<(), UploadError> {
        let json = serde_json::to_string(state)?;
        self.put(&chunk_state_key(file_id, state.index), &json).await
    }

    async fn load_chunk_state(&self, file_id: FileId, index: u64) -> Result<Option<ChunkState>, UploadError> {
        match self.get(&chunk_state_key(file_id, index)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
