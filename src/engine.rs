//! Engine Lifecycle (component J)
//!
//! Owns the task/result queues, spawns the generator, worker pool, health
//! monitor and aggregator, and coordinates graceful shutdown.

use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, instrument, warn};

use crate::checker::pipeline::PipelineContext;
use crate::checker::types::{AttemptResult, CheckConfig, Stats, Task};
use crate::checker::{spawn_pool, ResultAggregator, TaskGenerator};
use crate::combo::{load_combos, Combo};
use crate::config::{EngineConfig, ProxyStrategyConfig};
use crate::metrics::CheckerMetrics;
use crate::proxy::{load_proxies, HealthMonitor, HealthMonitorConfig, ProxyRegistry, Scheme, Strategy};
use crate::shutdown::ShutdownCoordinator;
use crate::sinks::{FileSink, LoggerSink, ResultSink};
use crate::transport::HttpTransport;
use crate::Result;

fn strategy_from_config(config: &ProxyStrategyConfig) -> Strategy {
    match config {
        ProxyStrategyConfig::RoundRobin => Strategy::RoundRobin,
        ProxyStrategyConfig::RandomHealthy => Strategy::RandomHealthy,
        ProxyStrategyConfig::BestScore => Strategy::BestScore,
        ProxyStrategyConfig::GeoPreferred { country } => Strategy::GeoPreferred {
            country: country.clone(),
        },
    }
}

/// The credential-validation engine: worker pool, proxy manager, per-attempt
/// pipeline, and lifecycle/shutdown coordination (spec §4.1).
pub struct Engine {
    config: EngineConfig,
    registry: Arc<ProxyRegistry>,
    transport: Arc<HttpTransport>,
    stats: Arc<RwLock<Stats>>,
    shutdown: Arc<ShutdownCoordinator>,
    combos: Vec<Combo>,
    configs: Vec<Arc<CheckConfig>>,
    active_workers: Arc<AtomicUsize>,
    metrics: Arc<CheckerMetrics>,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
    generator_handle: Option<tokio::task::JoinHandle<()>>,
    aggregator_handle: Option<tokio::task::JoinHandle<()>>,
    health_handle: Option<tokio::task::JoinHandle<()>>,
    management_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self {
            shutdown: Arc::new(ShutdownCoordinator::new(config.shutdown_timeout)),
            config,
            registry: Arc::new(ProxyRegistry::new()),
            transport,
            stats: Arc::new(RwLock::new(Stats::new(0, 0))),
            combos: Vec::new(),
            configs: Vec::new(),
            active_workers: Arc::new(AtomicUsize::new(0)),
            metrics: Arc::new(CheckerMetrics::new()),
            worker_handles: Vec::new(),
            generator_handle: None,
            aggregator_handle: None,
            health_handle: None,
            management_handle: None,
        })
    }

    #[instrument(skip(self, path))]
    pub async fn load_combos(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let result = load_combos(path).await?;
        info!(loaded = result.combos.len(), skipped = result.skipped, "combos loaded");
        self.combos = result.combos;
        Ok(())
    }

    /// Accepts already-parsed configs; config-file parsing is out of scope
    /// for the core (spec §1).
    pub fn load_configs(&mut self, configs: Vec<CheckConfig>) {
        self.configs = configs.into_iter().map(Arc::new).collect();
    }

    #[instrument(skip(self, path))]
    pub async fn load_proxies(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let result = load_proxies(path).await?;
        let mut added = 0usize;
        for proxy in result.proxies {
            if self
                .registry
                .add(proxy.host, proxy.port, proxy.scheme, None, None, None)
                .await
                .is_some()
            {
                added += 1;
            }
        }
        info!(added, skipped = result.skipped, "proxies loaded");
        Ok(())
    }

    /// Register a single proxy programmatically (e.g. from an
    /// auto-scraping collaborator).
    pub async fn add_proxy(&self, host: String, port: u16, scheme: Scheme) {
        self.registry.add(host, port, scheme, None, None, None).await;
    }

    /// Start sequence (spec §4.1): registry + health monitor, worker fan-out
    /// on the task queue, one result processor, one task generator.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if !self.configs.is_empty()
            && self.configs.iter().all(|c| c.requires_proxy)
            && self.registry.is_empty().await
        {
            warn!("all configs require a proxy but none are configured");
        }

        {
            let mut stats = self.stats.write().await;
            *stats = Stats::new(self.combos.len(), self.registry.len().await);
        }

        let queue_capacity = 2 * self.config.max_workers;
        let (task_tx, task_rx) = mpsc::channel::<Task>(queue_capacity);
        let (result_tx, result_rx) = mpsc::channel::<AttemptResult>(queue_capacity);

        let strategy = strategy_from_config(&self.config.proxy_strategy);

        let health_monitor = HealthMonitor::new(
            self.registry.clone(),
            HealthMonitorConfig {
                interval: self.config.health_check_interval,
                probe_timeout: self.config.proxy_timeout,
                ..Default::default()
            },
        );
        self.health_handle = Some(tokio::spawn(health_monitor.run(self.shutdown.signal())));

        if self.config.management_enabled {
            let bind_addr = self.config.management_bind_addr;
            let stats = self.stats.clone();
            let registry = self.registry.clone();
            let metrics = self.metrics.clone();
            self.management_handle = Some(tokio::spawn(async move {
                if let Err(e) = crate::management::serve(bind_addr, stats, registry, metrics).await {
                    tracing::error!(error = %e, "management API server error");
                }
            }));
        }

        let pipeline_ctx = Arc::new(PipelineContext {
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            strategy: strategy.clone(),
            request_timeout: self.config.request_timeout,
            retry_count: self.config.retry_count,
        });

        self.worker_handles = spawn_pool(
            self.config.max_workers,
            pipeline_ctx,
            task_rx,
            result_tx,
            self.shutdown.signal(),
            self.active_workers.clone(),
        );

        let sinks: Vec<Box<dyn ResultSink>> = vec![
            Box::new(FileSink::new(self.config.output_dir.clone(), self.config.output_format)),
            Box::new(LoggerSink),
        ];
        let aggregator = ResultAggregator::new(
            self.stats.clone(),
            sinks,
            self.config.save_valid_only,
            self.active_workers.clone(),
            self.registry.clone(),
            self.metrics.clone(),
        );
        self.aggregator_handle = Some(tokio::spawn(aggregator.run(result_rx)));

        let generator = TaskGenerator::new(self.registry.clone(), strategy);
        let combos = self.combos.clone();
        let configs = self.configs.clone();
        self.generator_handle = Some(tokio::spawn(generator.run(
            combos,
            configs,
            task_tx,
            self.shutdown.signal(),
        )));

        info!(workers = self.config.max_workers, "engine started");
        Ok(())
    }

    /// Stop sequence (spec §4.1): idempotent, safe from any context. Signals
    /// cancellation, joins every spawned task, and returns once drained.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        self.shutdown.stop();

        if let Some(handle) = self.generator_handle.take() {
            let _ = handle.await;
        }

        for handle in self.worker_handles.drain(..) {
            let _ = handle.await;
        }

        if let Some(handle) = self.aggregator_handle.take() {
            let _ = handle.await;
        }

        if let Some(handle) = self.health_handle.take() {
            let _ = handle.await;
        }

        if let Some(handle) = self.management_handle.take() {
            handle.abort();
        }

        self.shutdown.notify_complete();
        info!("engine stopped");
    }

    /// Block until SIGINT/SIGTERM/Ctrl+C, then stop. Convenience wrapper
    /// for CLI front-ends.
    pub async fn run_until_signal(&mut self) -> Result<()> {
        self.shutdown.listen_for_signals().await?;
        self.stop().await;
        Ok(())
    }

    pub async fn stats(&self) -> Stats {
        self.stats.read().await.clone()
    }

    pub fn shutdown_handle(&self) -> Arc<ShutdownCoordinator> {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::types::HttpMethod;
    use std::collections::{HashMap, HashSet};

    fn trivial_config(name: &str) -> CheckConfig {
        CheckConfig {
            name: std::sync::Arc::from(name),
            method: HttpMethod::Get,
            url_template: "http://example.test/".to_string(),
            header_templates: HashMap::new(),
            body_fields: HashMap::new(),
            success_statuses: HashSet::from([200]),
            failure_statuses: HashSet::new(),
            success_markers: vec![],
            failure_markers: vec![],
            requires_proxy: false,
            may_use_proxy: false,
            capture_steps: vec![],
        }
    }

    #[tokio::test]
    async fn stop_before_start_is_safe() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.stop().await;
    }

    #[tokio::test]
    async fn double_stop_is_idempotent() {
        let config = EngineConfig {
            management_enabled: false,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config).unwrap();
        engine.load_configs(vec![trivial_config("site")]);
        engine.start().await.unwrap();
        engine.stop().await;
        engine.stop().await;
    }
}
