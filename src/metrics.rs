//! Engine Metrics
//!
//! Prometheus counters/gauges for the checker's throughput and proxy
//! health, exported via a `/metrics` text endpoint alongside the
//! operator-facing status API.

use prometheus::{Counter, Gauge, Registry, TextEncoder};
use tracing::warn;

use crate::checker::types::AttemptStatus;

/// Owns and updates every Prometheus metric the engine exports.
pub struct CheckerMetrics {
    registry: Registry,
    valid_total: Counter,
    invalid_total: Counter,
    errors_total: Counter,
    current_cpm: Gauge,
    active_workers: Gauge,
    working_proxies: Gauge,
}

impl CheckerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let valid_total = Counter::new("credcheck_valid_total", "Total combos classified as valid")
            .expect("failed to create valid_total counter");
        let invalid_total = Counter::new("credcheck_invalid_total", "Total combos classified as invalid")
            .expect("failed to create invalid_total counter");
        let errors_total = Counter::new("credcheck_errors_total", "Total attempts that ended in error")
            .expect("failed to create errors_total counter");
        let current_cpm = Gauge::new("credcheck_current_cpm", "Checks per minute over the run so far")
            .expect("failed to create current_cpm gauge");
        let active_workers = Gauge::new("credcheck_active_workers", "Workers currently processing an attempt")
            .expect("failed to create active_workers gauge");
        let working_proxies = Gauge::new("credcheck_working_proxies", "Proxies currently marked working")
            .expect("failed to create working_proxies gauge");

        for metric in [&valid_total, &invalid_total, &errors_total] {
            registry
                .register(Box::new(metric.clone()))
                .expect("failed to register counter");
        }
        for metric in [&current_cpm, &active_workers, &working_proxies] {
            registry
                .register(Box::new(metric.clone()))
                .expect("failed to register gauge");
        }

        Self {
            registry,
            valid_total,
            invalid_total,
            errors_total,
            current_cpm,
            active_workers,
            working_proxies,
        }
    }

    pub fn record_result(&self, status: AttemptStatus) {
        match status {
            AttemptStatus::Success => self.valid_total.inc(),
            AttemptStatus::Fail => self.invalid_total.inc(),
            AttemptStatus::Error => self.errors_total.inc(),
        }
    }

    pub fn set_current_cpm(&self, cpm: f64) {
        self.current_cpm.set(cpm);
    }

    pub fn set_active_workers(&self, count: usize) {
        self.active_workers.set(count as f64);
    }

    pub fn set_working_proxies(&self, count: usize) {
        self.working_proxies.set(count as f64);
    }

    /// Render the current metric set in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buf = String::new();
        if let Err(e) = encoder.encode_utf8(&families, &mut buf) {
            warn!(error = %e, "failed to encode metrics");
        }
        buf
    }
}

impl Default for CheckerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_result_increments_matching_counter() {
        let metrics = CheckerMetrics::new();
        metrics.record_result(AttemptStatus::Success);
        metrics.record_result(AttemptStatus::Fail);
        metrics.record_result(AttemptStatus::Error);
        let encoded = metrics.encode();
        assert!(encoded.contains("credcheck_valid_total 1"));
        assert!(encoded.contains("credcheck_invalid_total 1"));
        assert!(encoded.contains("credcheck_errors_total 1"));
    }
}
