// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Throughput and ETA figures surfaced to the progress callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStats {
    pub start_time: DateTime<Utc>,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub chunks_uploaded: u64,
    pub total_chunks: u64,
    pub speed_bytes_per_sec: f64,
    pub average_speed_bytes_per_sec: f64,
    pub time_remaining_secs: Option<f64>,
    pub retry_count: u32,
}

impl UploadStats {
    pub fn zero(total_bytes: u64) -> Self {
        UploadStats {
            start_time: Utc::now(),
            total_bytes,
            uploaded_bytes: 0,
            chunks_uploaded: 0,
            total_chunks: 0,
            speed_bytes_per_sec: 0.0,
            average_speed_bytes_per_sec: 0.0,
            time_remaining_secs: None,
            retry_count: 0,
        }
    }

    /// Recomputes speed and ETA from a fresh `(uploaded_bytes, now)`
    /// observation. Division by zero (no elapsed time yet, or zero speed) is
    /// guarded explicitly rather than producing `NaN`/`inf`.
    pub fn update(&mut self, uploaded_bytes: u64, chunks_uploaded: u64, now: DateTime<Utc>) {
        let elapsed_secs = (now - self.start_time).num_milliseconds() as f64 / 1000.0;
        self.uploaded_bytes = uploaded_bytes;
        self.chunks_uploaded = chunks_uploaded;
        self.average_speed_bytes_per_sec = if elapsed_secs > 0.0 {
            uploaded_bytes as f64 / elapsed_secs
        } else {
            0.0
        };
        self.speed_bytes_per_sec = self.average_speed_bytes_per_sec;
        self.time_remaining_secs = if self.speed_bytes_per_sec > 0.0 {
            let remaining_bytes = self.total_bytes.saturating_sub(uploaded_bytes) as f64;
            Some(remaining_bytes / self.speed_bytes_per_sec)
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zero_elapsed_time_does_not_divide_by_zero() {
        let mut stats = UploadStats::zero(1000);
        stats.update(0, 0, stats.start_time);
        assert_eq!(stats.speed_bytes_per_sec, 0.0);
        assert!(stats.time_remaining_secs.is_none());
    }

    #[test]
    fn eta_shrinks_as_more_bytes_upload() {
        let mut stats = UploadStats::zero(1000);
        let later = stats.start_time + Duration::seconds(1);
        stats.update(500, 1, later);
        assert!(stats.time_remaining_secs.unwrap() > 0.0);
    }
}
