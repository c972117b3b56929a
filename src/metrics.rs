use axum::http::StatusCode;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::rewrite::RewriteOutcome;

pub struct Metrics {
    registry: Registry,
    rewrites_total: CounterVec,
    origin_requests: CounterVec,
    origin_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        // Rewrite outcome counter
        let rewrites_total = CounterVec::new(
            Opts::new(
                "edge_rewrites_total",
                "Requests seen by the rewrite rule, by outcome",
            ),
            &["outcome"],
        )
        .unwrap();

        // Origin requests counter
        let origin_requests = CounterVec::new(
            Opts::new(
                "edge_origin_requests_total",
                "Total requests forwarded to the origin",
            ),
            &["status"],
        )
        .unwrap();

        // Origin latency histogram
        let origin_duration = Histogram::with_opts(
            HistogramOpts::new(
                "edge_origin_request_duration_seconds",
                "Origin round-trip duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )
        .unwrap();

        registry.register(Box::new(rewrites_total.clone())).unwrap();
        registry
            .register(Box::new(origin_requests.clone()))
            .unwrap();
        registry
            .register(Box::new(origin_duration.clone()))
            .unwrap();

        Self {
            registry,
            rewrites_total,
            origin_requests,
            origin_duration,
        }
    }

    pub fn record_rewrite(&self, outcome: &RewriteOutcome) {
        self.rewrites_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// `status` is `None` when the origin could not be reached at all
    pub fn record_origin_request(&self, status: Option<StatusCode>, duration: Duration) {
        let status_str = status
            .map(|s| s.as_u16().to_string())
            .unwrap_or_else(|| "error".to_string());

        self.origin_requests.with_label_values(&[status_str.as_str()]).inc();
        self.origin_duration.observe(duration.as_secs_f64());
    }

    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_counters() {
        let metrics = Metrics::new();
        metrics.record_rewrite(&RewriteOutcome::Unchanged);
        metrics.record_rewrite(&RewriteOutcome::Stripped("/users".to_string()));
        metrics.record_rewrite(&RewriteOutcome::Stripped("/orders".to_string()));
        metrics.record_rewrite(&RewriteOutcome::Fallback("/health".to_string()));

        let output = metrics.gather();
        assert!(output.contains("edge_rewrites_total{outcome=\"stripped\"} 2"));
        assert!(output.contains("edge_rewrites_total{outcome=\"fallback\"} 1"));
        assert!(output.contains("edge_rewrites_total{outcome=\"unchanged\"} 1"));
    }

    #[test]
    fn test_origin_counters() {
        let metrics = Metrics::new();
        metrics.record_origin_request(Some(StatusCode::OK), Duration::from_millis(12));
        metrics.record_origin_request(None, Duration::from_millis(30));

        let output = metrics.gather();
        assert!(output.contains("edge_origin_requests_total{status=\"200\"} 1"));
        assert!(output.contains("edge_origin_requests_total{status=\"error\"} 1"));
        assert!(output.contains("edge_origin_request_duration_seconds_count 2"));
    }
}
