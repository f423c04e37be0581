//! Proxy Registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::types::{
    quality_of, score_of, Location, Outcome, Proxy, ProxyHandle, ProxyMetrics, ProxyView, Quality,
    Scheme,
};

/// Proxy selection strategy (spec §4.2, enumerated as a closed set).
#[derive(Debug, Clone)]
pub enum Strategy {
    RoundRobin,
    RandomHealthy,
    BestScore,
    GeoPreferred { country: String },
}

/// Set of proxies plus per-proxy metrics, scoring, and selection (spec §4.2,
/// component D). Internally sharded into a single mutex-guarded map; callers
/// only ever see an opaque [`ProxyHandle`].
pub struct ProxyRegistry {
    inner: RwLock<HashMap<u64, Proxy>>,
    insertion_order: RwLock<Vec<u64>>,
    round_robin_cursor: AtomicU64,
    next_id: AtomicU64,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            insertion_order: RwLock::new(Vec::new()),
            round_robin_cursor: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new proxy, rejecting exact host:port:scheme duplicates.
    #[instrument(skip(self), fields(host = %host, port))]
    pub async fn add(
        &self,
        host: String,
        port: u16,
        scheme: Scheme,
        username: Option<String>,
        password: Option<String>,
        location: Option<Location>,
    ) -> Option<ProxyHandle> {
        let mut proxies = self.inner.write().await;
        let duplicate = proxies
            .values()
            .any(|p| p.host == host && p.port == port && p.scheme == scheme);
        if duplicate {
            debug!("duplicate proxy rejected");
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ProxyHandle(id);
        let proxy = Proxy {
            handle,
            host,
            port,
            scheme,
            username,
            password,
            working: true,
            metrics: ProxyMetrics::default(),
            location,
        };
        proxies.insert(id, proxy);
        drop(proxies);
        self.insertion_order.write().await.push(id);
        Some(handle)
    }

    /// Select a proxy under the given strategy. Returns `None` iff the
    /// registry is empty or every proxy is `dead`.
    pub async fn pick(&self, strategy: &Strategy) -> Option<ProxyHandle> {
        let proxies = self.inner.read().await;
        if proxies.is_empty() {
            return None;
        }

        match strategy {
            Strategy::RoundRobin => self.pick_round_robin(&proxies).await,
            Strategy::RandomHealthy => self.pick_random_healthy(&proxies),
            Strategy::BestScore => self.pick_best_score(&proxies, None),
            Strategy::GeoPreferred { country } => {
                match self.pick_best_score(&proxies, Some(country.as_str())) {
                    Some(h) => Some(h),
                    None => self.pick_best_score(&proxies, None),
                }
            }
        }
    }

    async fn pick_round_robin(&self, proxies: &HashMap<u64, Proxy>) -> Option<ProxyHandle> {
        let order = self.insertion_order.read().await;
        let n = order.len() as u64;
        if n == 0 {
            return None;
        }
        for _ in 0..n {
            let idx = self.round_robin_cursor.fetch_add(1, Ordering::SeqCst) % n;
            let id = order[idx as usize];
            if let Some(proxy) = proxies.get(&id) {
                if proxy.quality() != Quality::Dead {
                    return Some(proxy.handle);
                }
            }
        }
        None
    }

    fn pick_random_healthy(&self, proxies: &HashMap<u64, Proxy>) -> Option<ProxyHandle> {
        let candidates: Vec<&Proxy> = proxies
            .values()
            .filter(|p| p.working && p.quality() != Quality::Dead)
            .collect();
        candidates.choose(&mut rand::thread_rng()).map(|p| p.handle)
    }

    fn pick_best_score(&self, proxies: &HashMap<u64, Proxy>, country: Option<&str>) -> Option<ProxyHandle> {
        let mut best: Option<&Proxy> = None;
        let mut candidates: Vec<&Proxy> = proxies.values().collect();
        candidates.sort_by_key(|p| p.handle.0);

        for proxy in candidates {
            if proxy.quality() == Quality::Dead {
                continue;
            }
            if let Some(country) = country {
                let matches = proxy
                    .location
                    .as_ref()
                    .map(|l| l.country == country)
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
            }

            best = match best {
                None => Some(proxy),
                Some(current) => {
                    let current_score = current.score();
                    let proxy_score = proxy.score();
                    if proxy_score > current_score
                        || (proxy_score == current_score
                            && proxy.metrics.ewma_latency_ms < current.metrics.ewma_latency_ms)
                    {
                        Some(proxy)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best.map(|p| p.handle)
    }

    /// Record the outcome of an attempt that used `handle`. A no-op for an
    /// unknown handle.
    #[instrument(skip(self))]
    pub async fn report(&self, handle: ProxyHandle, outcome: Outcome) {
        let mut proxies = self.inner.write().await;
        let Some(proxy) = proxies.get_mut(&handle.0) else {
            return;
        };

        match outcome {
            Outcome::Success { latency_ms } => proxy.metrics.record_success(latency_ms),
            Outcome::Timeout | Outcome::ProtocolError | Outcome::AuthError | Outcome::ConnectError => {
                proxy.metrics.record_failure(None);
            }
        }

        proxy.working = proxy.quality() != Quality::Dead;
        if !proxy.working {
            warn!(host = %proxy.host, port = proxy.port, "proxy marked dead");
        }
    }

    /// Apply a freshly measured latency without touching success/failure
    /// counters; used by the health monitor (spec §4.3).
    pub async fn report_probe_latency(&self, handle: ProxyHandle, latency_ms: f64, healthy: bool) {
        let outcome = if healthy {
            Outcome::Success { latency_ms }
        } else {
            Outcome::ConnectError
        };
        self.report(handle, outcome).await;
    }

    /// Snapshot of every proxy's outward-visible state.
    pub async fn snapshot(&self) -> Vec<ProxyView> {
        self.inner.read().await.values().map(ProxyView::from).collect()
    }

    /// Count of proxies currently marked `working`.
    pub async fn working_count(&self) -> usize {
        self.inner.read().await.values().filter(|p| p.working).count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Up to `k` proxies least recently probed, for the health monitor.
    pub async fn least_recently_probed(&self, k: usize) -> Vec<ProxyHandle> {
        let proxies = self.inner.read().await;
        let mut all: Vec<&Proxy> = proxies.values().collect();
        all.sort_by_key(|p| p.metrics.last_probed_at);
        all.into_iter().take(k).map(|p| p.handle).collect()
    }

    /// True iff every registered proxy is dead (spec §4.2 `pick` contract).
    pub async fn all_dead(&self) -> bool {
        let proxies = self.inner.read().await;
        !proxies.is_empty() && proxies.values().all(|p| p.quality() == Quality::Dead)
    }

    /// Proxy URL for the transport adapter, resolved from a handle.
    pub async fn url_for(&self, handle: ProxyHandle) -> Option<String> {
        self.inner.read().await.get(&handle.0).map(|p| p.url())
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn handle_score(metrics: &ProxyMetrics) -> f64 {
    score_of(metrics)
}

pub fn handle_quality(metrics: &ProxyMetrics) -> Quality {
    quality_of(score_of(metrics), metrics.consecutive_failures)
}

pub type SharedRegistry = Arc<ProxyRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry_with_n(n: usize) -> ProxyRegistry {
        let registry = ProxyRegistry::new();
        for i in 0..n {
            registry
                .add(format!("10.0.0.{}", i), 8080, Scheme::Http, None, None, None)
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn round_robin_visits_each_proxy_once_per_cycle() {
        let registry = registry_with_n(3).await;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            let handle = registry.pick(&Strategy::RoundRobin).await.unwrap();
            seen.insert(handle.0);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn pick_returns_none_when_empty() {
        let registry = ProxyRegistry::new();
        assert!(registry.pick(&Strategy::BestScore).await.is_none());
    }

    #[tokio::test]
    async fn pick_returns_none_when_all_dead() {
        let registry = registry_with_n(1).await;
        let handle = registry.pick(&Strategy::BestScore).await.unwrap();
        for _ in 0..10 {
            registry.report(handle, Outcome::Timeout).await;
        }
        assert!(registry.pick(&Strategy::BestScore).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_add_rejected() {
        let registry = ProxyRegistry::new();
        registry
            .add("1.2.3.4".into(), 80, Scheme::Http, None, None, None)
            .await
            .unwrap();
        let dup = registry
            .add("1.2.3.4".into(), 80, Scheme::Http, None, None, None)
            .await;
        assert!(dup.is_none());
    }

    #[tokio::test]
    async fn best_score_prefers_lower_latency_on_tie() {
        let registry = registry_with_n(2).await;
        let snapshot = registry.snapshot().await;
        let a = snapshot[0].handle;
        let b = snapshot[1].handle;
        registry.report(a, Outcome::Success { latency_ms: 500.0 }).await;
        registry.report(b, Outcome::Success { latency_ms: 50.0 }).await;
        let picked = registry.pick(&Strategy::BestScore).await.unwrap();
        assert_eq!(picked, b);
    }
}
