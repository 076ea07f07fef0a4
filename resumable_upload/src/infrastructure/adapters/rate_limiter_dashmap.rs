// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rate Limiter Adapter (C8, throttling half)
//!
//! Wraps the domain's pure [`SlidingWindow`] counter in a `DashMap` keyed by
//! user id, plus a second, independent counter bounding how many uploads a
//! user may have concurrently in flight. `check_rate_limit` admits and
//! increments both; `release_rate_limit` only decrements the concurrency
//! counter, per the spec -- a user's 60-second request budget is not
//! refunded early just because an upload finished.

use chrono::Utc;
use dashmap::DashMap;
use resumable_upload_domain::services::SlidingWindow;
use resumable_upload_domain::UploadError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub struct RateLimiterConfig {
    pub window_ms: u64,
    pub max_requests_per_minute: u32,
    pub max_concurrent_uploads: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests_per_minute: 100,
            max_concurrent_uploads: 10,
        }
    }
}

/// Per-user sliding-window request counter plus an independent concurrency
/// counter, shared across every upload flow for that user.
pub struct DashMapRateLimiter {
    windows: DashMap<String, SlidingWindow>,
    concurrency: DashMap<String, Arc<AtomicU32>>,
    config: RateLimiterConfig,
}

impl DashMapRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            windows: DashMap::new(),
            concurrency: DashMap::new(),
            config,
        }
    }

    /// Admits one request for `user_id` if it is under both the sliding
    /// request-rate window and the concurrent-upload cap, incrementing both
    /// counters on success.
    pub fn check_rate_limit(&self, user_id: &str) -> Result<(), UploadError> {
        let now_ms = Utc::now().timestamp_millis();
        let admitted = {
            let mut window = self
                .windows
                .entry(user_id.to_string())
                .or_insert_with(|| SlidingWindow::new(self.config.window_ms, self.config.max_requests_per_minute));
            window.try_admit(now_ms)
        };
        if !admitted {
            return Err(UploadError::SecurityViolation(format!(
                "rate limit exceeded for user {user_id}: max {} requests per minute",
                self.config.max_requests_per_minute
            )));
        }

        let counter = self
            .concurrency
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone();
        let current = counter.fetch_add(1, Ordering::AcqRel);
        if current >= self.config.max_concurrent_uploads {
            counter.fetch_sub(1, Ordering::AcqRel);
            return Err(UploadError::SecurityViolation(format!(
                "concurrent upload limit exceeded for user {user_id}: max {}",
                self.config.max_concurrent_uploads
            )));
        }
        Ok(())
    }

    /// Releases one concurrency slot for `user_id`. Does not refund the
    /// sliding-window request budget.
    pub fn release_rate_limit(&self, user_id: &str) {
        if let Some(counter) = self.concurrency.get(user_id) {
            let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1)));
        }
    }

    pub fn current_concurrency(&self, user_id: &str) -> u32 {
        self.concurrency
            .get(user_id)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_per_minute: u32, max_concurrent: u32) -> DashMapRateLimiter {
        DashMapRateLimiter::new(RateLimiterConfig {
            window_ms: 60_000,
            max_requests_per_minute: max_per_minute,
            max_concurrent_uploads: max_concurrent,
        })
    }

    #[test]
    fn admits_up_to_the_concurrency_cap_then_rejects() {
        let limiter = limiter(100, 3);
        for _ in 0..3 {
            assert!(limiter.check_rate_limit("user-1").is_ok());
        }
        assert!(limiter.check_rate_limit("user-1").is_err());
    }

    #[test]
    fn releasing_frees_a_concurrency_slot() {
        let limiter = limiter(100, 1);
        assert!(limiter.check_rate_limit("user-1").is_ok());
        assert!(limiter.check_rate_limit("user-1").is_err());
        limiter.release_rate_limit("user-1");
        assert!(limiter.check_rate_limit("user-1").is_ok());
    }

    #[test]
    fn different_users_have_independent_counters() {
        let limiter = limiter(100, 1);
        assert!(limiter.check_rate_limit("user-1").is_ok());
        assert!(limiter.check_rate_limit("user-2").is_ok());
    }

    #[test]
    fn request_rate_window_rejects_past_the_per_minute_cap() {
        let limiter = limiter(2, 100);
        assert!(limiter.check_rate_limit("user-1").is_ok());
        assert!(limiter.check_rate_limit("user-1").is_ok());
        assert!(limiter.check_rate_limit("user-1").is_err());
    }
}
