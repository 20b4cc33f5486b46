use lazy_static::lazy_static;
use prometheus::{register_gauge, register_int_gauge, Gauge, IntGauge};

use loadspin_core::ControllerSnapshot;

lazy_static! {
    pub static ref APDEX_SCORE: Gauge = register_gauge!(
        "loadspin_apdex_score",
        "Last published Apdex-style satisfaction score (0 to 1)"
    )
    .unwrap();
    pub static ref WORKERS: IntGauge = register_int_gauge!(
        "loadspin_workers",
        "Number of workers in the pool"
    )
    .unwrap();
    pub static ref REQUESTS_PER_SECOND: IntGauge = register_int_gauge!(
        "loadspin_requests_per_second",
        "Requests completed during the last scoring interval"
    )
    .unwrap();
}

/// Copy a controller snapshot into the gauges.
pub fn observe(snapshot: &ControllerSnapshot) {
    APDEX_SCORE.set(snapshot.score);
    WORKERS.set(snapshot.workers as i64);
    REQUESTS_PER_SECOND.set(snapshot.requests_last_second as i64);
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_gauges() {
        lazy_static::initialize(&APDEX_SCORE);
        lazy_static::initialize(&WORKERS);
        lazy_static::initialize(&REQUESTS_PER_SECOND);

        let text = render();
        assert!(text.contains("# TYPE loadspin_apdex_score gauge"));
        assert!(text.contains("# TYPE loadspin_workers gauge"));
        assert!(text.contains("# TYPE loadspin_requests_per_second gauge"));
    }
}
