//! Health Monitor (component E)
//!
//! Periodic background probe loop that keeps proxy metrics fresh without
//! ever blocking the main attempt pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, instrument, warn};

use super::registry::SharedRegistry;
use crate::shutdown::ShutdownSignal;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const MAX_CONCURRENT_PROBES: usize = 32;

/// Configuration for the health monitor loop.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub probe_url: String,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            probe_timeout: Duration::from_secs(10),
            probe_url: "https://www.google.com/generate_204".to_string(),
        }
    }
}

/// Drives periodic probing of the least-recently-probed proxies until the
/// engine signals shutdown.
pub struct HealthMonitor {
    registry: SharedRegistry,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    pub fn new(registry: SharedRegistry, config: HealthMonitorConfig) -> Self {
        Self { registry, config }
    }

    /// Run the monitor loop until `shutdown` fires. Each cycle probes up to
    /// `min(32, N)` least-recently-probed proxies with bounded concurrency;
    /// cancellation abandons in-flight probes best-effort.
    #[instrument(skip(self, shutdown))]
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = interval(self.config.interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("health monitor stopping");
                    return;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.run_cycle() => {}
                        _ = shutdown.cancelled() => {
                            debug!("health monitor cycle abandoned on shutdown");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        let n = self.registry.len().await;
        let k = MAX_CONCURRENT_PROBES.min(n);
        if k == 0 {
            return;
        }

        let targets = self.registry.least_recently_probed(k).await;
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
        let mut handles = Vec::with_capacity(targets.len());

        for handle in targets {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let registry = self.registry.clone();
            let url = self.config.probe_url.clone();
            let timeout = self.config.probe_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                probe_one(&registry, handle, &url, timeout).await;
            }));
        }

        for h in handles {
            let _ = h.await;
        }
    }
}

async fn probe_one(registry: &SharedRegistry, handle: super::types::ProxyHandle, url: &str, timeout: Duration) {
    let proxy_url = match registry.url_for(handle).await {
        Some(u) => u,
        None => return,
    };

    let client = match reqwest::Proxy::all(&proxy_url).and_then(|p| {
        reqwest::Client::builder().proxy(p).timeout(timeout).build()
    }) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to build probe client");
            registry.report_probe_latency(handle, 0.0, false).await;
            return;
        }
    };

    let started = Instant::now();
    match client.head(url).send().await {
        Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            registry.report_probe_latency(handle, latency_ms, true).await;
        }
        _ => {
            registry.report_probe_latency(handle, 0.0, false).await;
        }
    }
}
