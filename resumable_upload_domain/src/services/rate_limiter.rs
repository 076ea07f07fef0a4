// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rate Limiter (C8, throttling half)
//!
//! A pure sliding-window counter. The caller supplies "now" explicitly so
//! the algorithm stays deterministic and testable; the infrastructure
//! adapter owns the per-client `DashMap<ClientId, SlidingWindow>` and the
//! wall-clock reads.

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window_ms: u64,
    max_requests: u32,
    /// Timestamps (ms) of requests admitted within the current window.
    timestamps: Vec<i64>,
}

impl SlidingWindow {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            timestamps: Vec::new(),
        }
    }

    /// Evicts timestamps older than the window, then admits `now` if under
    /// the limit. Returns whether the request was admitted.
    pub fn try_admit(&mut self, now_ms: i64) -> bool {
        let cutoff = now_ms - self.window_ms as i64;
        self.timestamps.retain(|&t| t > cutoff);
        if self.timestamps.len() as u32 >= self.max_requests {
            return false;
        }
        self.timestamps.push(now_ms);
        true
    }

    pub fn current_count(&self, now_ms: i64) -> usize {
        let cutoff = now_ms - self.window_ms as i64;
        self.timestamps.iter().filter(|&&t| t > cutoff).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_requests_up_to_the_limit() {
        let mut window = SlidingWindow::new(1000, 3);
        assert!(window.try_admit(0));
        assert!(window.try_admit(100));
        assert!(window.try_admit(200));
        assert!(!window.try_admit(300));
    }

    #[test]
    fn expired_entries_free_up_capacity() {
        let mut window = SlidingWindow::new(1000, 2);
        assert!(window.try_admit(0));
        assert!(window.try_admit(100));
        assert!(!window.try_admit(200));
        assert!(window.try_admit(1200));
    }
}
