//! Prometheus metrics for a run.
//!
//! This module provides metrics for:
//! - Issue outcomes and processing duration, per source
//! - Lock contention
//! - Degraded outputs (remote upload failures, preview failures)
//! - Fan-out item results

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Terminal outcome per source and issue.
pub static ISSUE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "newsstand_issue_outcomes_total",
            "Terminal outcomes of issue processing",
        ),
        &["source", "outcome"], // "completed", "degraded", "skipped_locked", "skipped_duplicate", "failed"
    )
    .unwrap()
});

/// Wall time of one issue processor invocation.
pub static ISSUE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "newsstand_issue_duration_seconds",
            "Duration of one issue processor invocation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["source"],
    )
    .unwrap()
});

/// Lock acquisitions lost to another holder.
pub static LOCK_CONTENTION: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "newsstand_lock_contention_total",
            "Lock acquisitions that found the issue already locked",
        ),
        &["source"],
    )
    .unwrap()
});

/// Remote uploads that failed and left an artifact local-only.
pub static REMOTE_UPLOAD_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "newsstand_remote_upload_failures_total",
        "Remote uploads that failed (artifact kept locally)",
    )
    .unwrap()
});

/// Preview builds that failed.
pub static PREVIEW_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "newsstand_preview_failures_total",
        "Preview builds that failed",
    )
    .unwrap()
});

/// Fan-out items by result.
pub static FAN_OUT_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "newsstand_fan_out_items_total",
            "Items seen by fan-out sources",
        ),
        &["source", "result"], // "new", "already_recorded", "failed"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(ISSUE_OUTCOMES.clone())).unwrap();
    registry.register(Box::new(ISSUE_DURATION.clone())).unwrap();
    registry.register(Box::new(LOCK_CONTENTION.clone())).unwrap();
    registry
        .register(Box::new(REMOTE_UPLOAD_FAILURES.clone()))
        .unwrap();
    registry.register(Box::new(PREVIEW_FAILURES.clone())).unwrap();
    registry.register(Box::new(FAN_OUT_ITEMS.clone())).unwrap();
}

/// Renders all metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        ISSUE_OUTCOMES
            .with_label_values(&["metrics-test", "completed"])
            .inc();
        FAN_OUT_ITEMS
            .with_label_values(&["metrics-test", "new"])
            .inc();
        REMOTE_UPLOAD_FAILURES.inc();

        let text = encode_metrics().unwrap();
        assert!(text.contains("newsstand_issue_outcomes_total"));
        assert!(text.contains("newsstand_fan_out_items_total"));
        assert!(text.contains("newsstand_remote_upload_failures_total"));
    }
}
