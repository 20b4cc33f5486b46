// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Apdex-style satisfaction score.
//!
//! A custom five-band variant rather than the classic satisfied/tolerating
//! split. Each sample is truncated to whole milliseconds and weighted by the
//! band it falls in; bands are closed on their upper bound:
//!
//! | latency (ms) | weight |
//! |--------------|--------|
//! | 0 ..= 20     | 1.0    |
//! | 21 ..= 50    | 0.8    |
//! | 51 ..= 75    | 0.6    |
//! | 76 ..= 100   | 0.4    |
//! | > 100        | 0.0    |

use std::time::Duration;

/// Weight of a single sample.
pub fn weight(latency: Duration) -> f64 {
    match latency.as_millis() {
        0..=20 => 1.0,
        21..=50 => 0.8,
        51..=75 => 0.6,
        76..=100 => 0.4,
        _ => 0.0,
    }
}

/// Score a set of latencies into `[0, 1]`. An empty set scores 0.
pub fn score(latencies: &[Duration]) -> f64 {
    if latencies.is_empty() {
        return 0.0;
    }

    let total: f64 = latencies.iter().copied().map(weight).sum();
    total / latencies.len() as f64
}
