// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Tracing setup. The CLI installs this once at startup; library code
//! below it only ever emits `tracing::{debug,info,warn,error}` spans and
//! events, never writes to stdout directly.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global subscriber driven by `RUST_LOG`, falling back to
/// `default_level` (e.g. `"info"`) when the variable is unset or invalid.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(true).compact().init();
}

/// An RAII span timer for a single upload/chunk/scan operation, logged at
/// drop time with its elapsed duration. Mirrors the operation-tracking
/// pattern used for pipeline stage timing, scaled down to what this engine
/// needs: a named span plus a duration, not a full metrics pipeline.
pub struct OperationTimer {
    name: &'static str,
    started: std::time::Instant,
}

impl OperationTimer {
    pub fn start(name: &'static str) -> Self {
        tracing::debug!(operation = name, "started");
        Self {
            name,
            started: std::time::Instant::now(),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        tracing::debug!(operation = self.name, elapsed_ms = self.started.elapsed().as_millis() as u64, "finished");
    }
}
