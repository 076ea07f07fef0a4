// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! One file's entry in the queue scheduler (C12).

use crate::entities::UploadStats;
use crate::value_objects::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Queued,
    Uploading,
    Paused,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub file_id: FileId,
    pub priority: i32,
    pub status: QueueStatus,
    pub retry_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub stats: UploadStats,
}

impl QueueItem {
    pub fn new(file_id: FileId, priority: i32, enqueued_at: DateTime<Utc>, stats: UploadStats) -> Self {
        QueueItem {
            file_id,
            priority,
            status: QueueStatus::Queued,
            retry_attempts: 0,
            enqueued_at,
            stats,
        }
    }

    /// Ordering key for the scheduler. Sorting ascending by this key yields
    /// `(priority desc, retryAttempts asc, startTime asc)`.
    pub fn ordering_key(&self) -> (std::cmp::Reverse<i32>, u32, DateTime<Utc>) {
        (std::cmp::Reverse(self.priority), self.retry_attempts, self.enqueued_at)
    }
}
