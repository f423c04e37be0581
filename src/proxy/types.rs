//! Proxy Data Model

use std::time::{SystemTime, UNIX_EPOCH};

/// Transport scheme a proxy speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Socks4 => "socks4",
            Scheme::Socks5 => "socks5",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            "socks4" => Some(Scheme::Socks4),
            "socks5" => Some(Scheme::Socks5),
            _ => None,
        }
    }
}

/// Bucketed health rating derived from `score` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Ok,
    Bad,
    Dead,
}

/// Optional geographic metadata for `geo_preferred` selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub country: String,
}

/// Mutable per-proxy counters the scoring function is derived from.
#[derive(Debug, Clone)]
pub struct ProxyMetrics {
    pub total_attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub ewma_latency_ms: f64,
    pub last_probed_at: Option<SystemTime>,
    pub consecutive_failures: u32,
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self {
            total_attempts: 0,
            successes: 0,
            failures: 0,
            ewma_latency_ms: 0.0,
            last_probed_at: None,
            consecutive_failures: 0,
        }
    }
}

impl ProxyMetrics {
    /// Fold a reported latency into the EWMA, seeding it on the first sample.
    pub fn record_latency(&mut self, latency_ms: f64) {
        if self.total_attempts == 0 {
            self.ewma_latency_ms = latency_ms;
        } else {
            self.ewma_latency_ms = 0.3 * latency_ms + 0.7 * self.ewma_latency_ms;
        }
    }

    pub fn record_success(&mut self, latency_ms: f64) {
        self.total_attempts += 1;
        self.successes += 1;
        self.consecutive_failures = 0;
        self.last_probed_at = Some(SystemTime::now());
        self.record_latency(latency_ms);
    }

    pub fn record_failure(&mut self, latency_ms: Option<f64>) {
        self.total_attempts += 1;
        self.failures += 1;
        self.consecutive_failures += 1;
        self.last_probed_at = Some(SystemTime::now());
        if let Some(latency_ms) = latency_ms {
            self.record_latency(latency_ms);
        }
    }
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Compute the deterministic score for a metrics snapshot (spec §4.2).
pub fn score_of(metrics: &ProxyMetrics) -> f64 {
    let success_rate = metrics.successes as f64 / (metrics.total_attempts.max(1)) as f64;
    let latency_term = clamp(1.0 - (metrics.ewma_latency_ms / 5000.0), 0.0, 1.0);
    let penalty = (10.0 * metrics.consecutive_failures as f64).min(30.0);
    clamp(100.0 * (0.7 * success_rate + 0.3 * latency_term) - penalty, 0.0, 100.0)
}

/// Map a score + failure streak to the coarse quality bucket.
pub fn quality_of(score: f64, consecutive_failures: u32) -> Quality {
    if score < 10.0 || consecutive_failures >= 10 {
        Quality::Dead
    } else if score < 40.0 {
        Quality::Bad
    } else if score < 70.0 {
        Quality::Ok
    } else {
        Quality::Good
    }
}

/// Opaque handle identifying a proxy inside the registry. Never exposes the
/// proxy's interior state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyHandle(pub u64);

/// A single upstream proxy and its interior-owned state.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub handle: ProxyHandle,
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub working: bool,
    pub metrics: ProxyMetrics,
    pub location: Option<Location>,
}

impl Proxy {
    pub fn score(&self) -> f64 {
        score_of(&self.metrics)
    }

    pub fn quality(&self) -> Quality {
        quality_of(self.score(), self.metrics.consecutive_failures)
    }

    /// Build the proxy URL (`scheme://[user:pass@]host:port`) used by the
    /// HTTP transport adapter.
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => format!("{}://{}:{}@{}:{}", self.scheme.as_str(), u, p, self.host, self.port),
            _ => format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port),
        }
    }
}

/// Read-only outward view of a proxy, returned by `snapshot()`.
#[derive(Debug, Clone)]
pub struct ProxyView {
    pub handle: ProxyHandle,
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub working: bool,
    pub score: f64,
    pub quality: Quality,
    pub metrics: ProxyMetrics,
    pub location: Option<Location>,
}

impl From<&Proxy> for ProxyView {
    fn from(p: &Proxy) -> Self {
        Self {
            handle: p.handle,
            host: p.host.clone(),
            port: p.port,
            scheme: p.scheme,
            working: p.working,
            score: p.score(),
            quality: p.quality(),
            metrics: p.metrics.clone(),
            location: p.location.clone(),
        }
    }
}

/// Outcome reported back to the registry after an attempt used a proxy.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Success { latency_ms: f64 },
    Timeout,
    ProtocolError,
    AuthError,
    ConnectError,
}

pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_clamped_to_range() {
        let metrics = ProxyMetrics {
            total_attempts: 10,
            successes: 10,
            failures: 0,
            ewma_latency_ms: 0.0,
            last_probed_at: None,
            consecutive_failures: 0,
        };
        let score = score_of(&metrics);
        assert!((0.0..=100.0).contains(&score));
        assert_eq!(quality_of(score, 0), Quality::Good);
    }

    #[test]
    fn dead_when_consecutive_failures_high() {
        let metrics = ProxyMetrics {
            total_attempts: 20,
            successes: 15,
            failures: 5,
            ewma_latency_ms: 100.0,
            last_probed_at: None,
            consecutive_failures: 10,
        };
        assert_eq!(quality_of(score_of(&metrics), 10), Quality::Dead);
    }

    #[test]
    fn ewma_converges_to_constant_latency() {
        let mut metrics = ProxyMetrics::default();
        for _ in 0..10 {
            metrics.record_success(200.0);
        }
        assert!((metrics.ewma_latency_ms - 200.0).abs() < 0.05 * 200.0);
    }
}
