//! Result Aggregator (component I)
//!
//! Single consumer over the result queue: updates stats, then forwards to
//! the configured sinks. Never filters proxy reports — those already
//! happened inside the worker — and never fails the pipeline on a sink
//! error.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, instrument, warn};

use super::types::{AttemptResult, AttemptStatus, Stats};
use super::worker::ActiveWorkers;
use crate::metrics::CheckerMetrics;
use crate::proxy::ProxyRegistry;
use crate::sinks::ResultSink;

const EPSILON_MINUTES: f64 = 1.0 / 60.0;

/// Shared, read-write-locked engine statistics (spec §3, §5).
pub type SharedStats = Arc<RwLock<Stats>>;

pub struct ResultAggregator {
    stats: SharedStats,
    sinks: Vec<Box<dyn ResultSink>>,
    save_valid_only: bool,
    active_workers: ActiveWorkers,
    registry: Arc<ProxyRegistry>,
    metrics: Arc<CheckerMetrics>,
}

impl ResultAggregator {
    pub fn new(
        stats: SharedStats,
        sinks: Vec<Box<dyn ResultSink>>,
        save_valid_only: bool,
        active_workers: ActiveWorkers,
        registry: Arc<ProxyRegistry>,
        metrics: Arc<CheckerMetrics>,
    ) -> Self {
        Self {
            stats,
            sinks,
            save_valid_only,
            active_workers,
            registry,
            metrics,
        }
    }

    /// Consume results until the queue closes (all workers have exited).
    #[instrument(skip(self, rx))]
    pub async fn run(mut self, mut rx: mpsc::Receiver<AttemptResult>) {
        while let Some(result) = rx.recv().await {
            self.process(result).await;
        }
        info!("result aggregator exiting: queue closed");
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush().await {
                warn!(error = %e, "sink flush failed");
            }
        }
    }

    async fn process(&mut self, result: AttemptResult) {
        let active_workers = self.active_workers.load(Ordering::SeqCst);
        let working_proxies = self.registry.working_count().await;

        {
            let mut stats = self.stats.write().await;
            match result.status {
                AttemptStatus::Success => stats.valid += 1,
                AttemptStatus::Fail => stats.invalid += 1,
                AttemptStatus::Error => stats.errors += 1,
            }

            let elapsed_minutes = stats.start_time.elapsed_or_zero().max(EPSILON_MINUTES);
            stats.elapsed_seconds = elapsed_minutes * 60.0;
            stats.current_cpm = stats.total_processed() as f64 / elapsed_minutes;
            stats.active_workers = active_workers;
            stats.working_proxies = working_proxies;

            self.metrics.record_result(result.status);
            self.metrics.set_current_cpm(stats.current_cpm);
            self.metrics.set_active_workers(active_workers);
            self.metrics.set_working_proxies(working_proxies);
        }

        let should_export = !self.save_valid_only || result.status == AttemptStatus::Success;
        if should_export {
            for sink in &mut self.sinks {
                if let Err(e) = sink.write(&result).await {
                    warn!(error = %e, task_id = result.task_id, "sink write failed");
                }
            }
        }

        tracing::info!(
            task_id = result.task_id,
            correlation_id = %result.correlation_id,
            config = %result.config_name,
            status = ?result.status,
            latency_ms = result.latency_ms,
            "checker_event"
        );
    }
}

trait ElapsedMinutes {
    fn elapsed_or_zero(&self) -> f64;
}

impl ElapsedMinutes for SystemTime {
    fn elapsed_or_zero(&self) -> f64 {
        self.elapsed().map(|d| d.as_secs_f64() / 60.0).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::types::Stats;
    use crate::proxy::{ProxyRegistry, Scheme};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    fn sample_result(status: AttemptStatus) -> AttemptResult {
        AttemptResult {
            task_id: 1,
            correlation_id: "abc123".to_string(),
            combo: crate::combo::Combo::parse("alice:hunter2").unwrap(),
            config_name: Arc::from("site"),
            status,
            http_status: Some(200),
            latency_ms: 42.0,
            error_kind: None,
            proxy_used: None,
            captured_variables: HashMap::new(),
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn process_copies_live_worker_and_proxy_counts_into_stats() {
        let stats = Arc::new(RwLock::new(Stats::new(0, 0)));
        let registry = Arc::new(ProxyRegistry::new());
        registry
            .add("1.2.3.4".to_string(), 80, Scheme::Http, None, None, None)
            .await
            .unwrap();
        let active_workers: ActiveWorkers = Arc::new(AtomicUsize::new(4));
        let metrics = Arc::new(CheckerMetrics::new());

        let mut aggregator = ResultAggregator::new(stats.clone(), vec![], false, active_workers, registry, metrics);
        aggregator.process(sample_result(AttemptStatus::Success)).await;

        let stats = stats.read().await;
        assert_eq!(stats.active_workers, 4);
        assert_eq!(stats.working_proxies, 1);
        assert_eq!(stats.valid, 1);
    }
}
