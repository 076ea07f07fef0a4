// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Console rendering of [`ProgressSnapshot`], throttled upstream by the
//! upload manager so this never has to debounce its own output.

use std::io::Write as _;
use std::sync::Arc;

use crate::application::{ProgressCallback, ProgressSnapshot};

fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(rate) => format!("{:.1} MB/s", rate / (1024.0 * 1024.0)),
        None => "-- MB/s".to_string(),
    }
}

fn format_eta(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) if secs.is_finite() && secs >= 0.0 => format!("{:.0}s", secs),
        _ => "--".to_string(),
    }
}

/// A [`ProgressCallback`] that overwrites a single terminal line with
/// percent complete, throughput, and ETA, then prints a final newline once
/// the file completes.
pub fn console_reporter() -> ProgressCallback {
    Arc::new(|snapshot: ProgressSnapshot| {
        render(&snapshot);
    })
}

fn render(snapshot: &ProgressSnapshot) {
    let percent = if snapshot.total_bytes == 0 {
        100.0
    } else {
        (snapshot.bytes_uploaded as f64 / snapshot.total_bytes as f64) * 100.0
    };
    print!(
        "\r{:>6.2}%  {}/{} bytes  {}  eta {}          ",
        percent,
        snapshot.bytes_uploaded,
        snapshot.total_bytes,
        format_rate(snapshot.speed_bytes_per_sec),
        format_eta(snapshot.estimated_time_remaining_secs),
    );
    let _ = std::io::stdout().flush();
    if snapshot.bytes_uploaded >= snapshot.total_bytes {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rate_renders_none_as_a_placeholder() {
        assert_eq!(format_rate(None), "-- MB/s");
    }

    #[test]
    fn format_rate_converts_bytes_to_megabytes() {
        assert_eq!(format_rate(Some(2.0 * 1024.0 * 1024.0)), "2.0 MB/s");
    }

    #[test]
    fn format_eta_rejects_non_finite_values() {
        assert_eq!(format_eta(Some(f64::INFINITY)), "--");
        assert_eq!(format_eta(None), "--");
    }
}
