// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Retry Policy (C7, retry half)
//!
//! Maps `(ErrorKind, attempt, message)` to a `(should_retry, delay)`
//! decision using one of four backoff curves. Default strategies mirror the
//! per-kind table: network retries the most and backs off exponentially,
//! validation errors require user action and never retry automatically.

use crate::error::ErrorKind;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffCurve {
    Immediate,
    Linear,
    Exponential,
    Fibonacci,
}

impl BackoffCurve {
    /// Delay for 1-indexed attempt `k`, in milliseconds, before the
    /// `max_delay_ms` cap is applied.
    fn raw_delay_ms(&self, k: u32, base_delay_ms: u64) -> u64 {
        match self {
            BackoffCurve::Immediate => 0,
            BackoffCurve::Linear => base_delay_ms * k as u64,
            BackoffCurve::Exponential => base_delay_ms.saturating_mul(1u64 << (k.saturating_sub(1).min(62))),
            BackoffCurve::Fibonacci => base_delay_ms * fibonacci(k),
        }
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

#[derive(Debug, Clone)]
pub struct RetryStrategy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub curve: BackoffCurve,
    /// Substrings of the error message that short-circuit retry even under
    /// the max-retries cap (e.g. `QUOTA_EXCEEDED`).
    pub skip_if_contains: Vec<&'static str>,
    /// If true, this kind always requires a user action and is never
    /// retried automatically.
    pub requires_user_action: bool,
}

impl RetryStrategy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.curve.raw_delay_ms(attempt, self.base_delay_ms);
        Duration::from_millis(raw.min(self.max_delay_ms))
    }
}

/// Default strategy table, one entry per [`ErrorKind`].
pub fn default_strategy(kind: ErrorKind) -> RetryStrategy {
    match kind {
        ErrorKind::Network => RetryStrategy {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            curve: BackoffCurve::Exponential,
            skip_if_contains: vec!["QUOTA_EXCEEDED", "PERMISSION_DENIED"],
            requires_user_action: false,
        },
        ErrorKind::Server => RetryStrategy {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
            curve: BackoffCurve::Linear,
            skip_if_contains: vec!["NOT_FOUND", "INVALID_ARGUMENT"],
            requires_user_action: false,
        },
        ErrorKind::Validation => RetryStrategy {
            max_retries: 2,
            base_delay_ms: 0,
            max_delay_ms: 1000,
            curve: BackoffCurve::Immediate,
            skip_if_contains: vec![],
            requires_user_action: true,
        },
        ErrorKind::Storage => RetryStrategy {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
            curve: BackoffCurve::Exponential,
            skip_if_contains: vec!["QUOTA_EXCEEDED"],
            requires_user_action: false,
        },
        ErrorKind::Unknown => RetryStrategy {
            max_retries: 1,
            base_delay_ms: 500,
            max_delay_ms: 2000,
            curve: BackoffCurve::Exponential,
            skip_if_contains: vec![],
            requires_user_action: false,
        },
    }
}

/// Decides whether to retry the failed attempt and, if so, after what delay.
/// `attempt` is the 1-indexed attempt number that just failed.
pub fn handle_error(kind: ErrorKind, message: &str, attempt: u32) -> (bool, Duration) {
    let strategy = default_strategy(kind);
    if strategy.requires_user_action {
        return (false, Duration::ZERO);
    }
    if strategy.skip_if_contains.iter().any(|needle| message.contains(needle)) {
        return (false, Duration::ZERO);
    }
    if attempt >= strategy.max_retries {
        return (false, Duration::ZERO);
    }
    (true, strategy.delay_for_attempt(attempt))
}
