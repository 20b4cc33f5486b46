//! `loadspin watch` command - Live dashboard for a running instance.

use std::time::Duration;

use crate::tui;

pub async fn execute(url: &str, interval_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(url = %url, interval_ms, "Opening dashboard");
    tui::run_dashboard(url, Duration::from_millis(interval_ms.max(100))).await
}
