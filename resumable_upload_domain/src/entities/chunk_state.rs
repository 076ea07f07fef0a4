// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-chunk persisted progress, recorded before every upload attempt so a
//! crash mid-attempt leaves an accurate `attempts` count behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkState {
    pub index: u64,
    pub size: u64,
    pub offset: u64,
    pub checksum: String,
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ChunkState {
    pub fn new(index: u64, size: u64, offset: u64, checksum: String) -> Self {
        ChunkState {
            index,
            size,
            offset,
            checksum,
            attempts: 0,
            last_attempt: None,
            error: None,
        }
    }

    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt = Some(now);
    }

    pub fn record_success(&mut self) {
        self.error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }
}
