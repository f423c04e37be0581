//! Engine Configuration Types

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine-level configuration (spec §4.1).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub max_workers: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub proxy_timeout: Duration,
    pub retry_count: usize,
    pub proxy_rotation: bool,
    pub auto_scrape_proxies: bool,
    pub save_valid_only: bool,
    pub output_format: OutputFormat,
    pub output_dir: PathBuf,
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub proxy_strategy: ProxyStrategyConfig,
    pub log_level: String,
    /// Whether the `/health`/`/stats`/`/metrics` status API is spawned
    /// alongside the engine (spec §5 ambient observability).
    pub management_enabled: bool,
    pub management_bind_addr: SocketAddr,
}

/// Output record format for the result sinks (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Json,
    Csv,
}

/// Proxy selection strategy, mirroring spec §4.2's enumerated strategies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyStrategyConfig {
    RoundRobin,
    RandomHealthy,
    BestScore,
    GeoPreferred { country: String },
}

/// The hard ceiling on a single attempt's deadline, regardless of config
/// (spec §4.1, §4.6).
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 20,
            request_timeout: Duration::from_secs(20),
            proxy_timeout: Duration::from_secs(10),
            retry_count: 3,
            proxy_rotation: true,
            auto_scrape_proxies: false,
            save_valid_only: false,
            output_format: OutputFormat::Txt,
            output_dir: PathBuf::from("results"),
            health_check_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            proxy_strategy: ProxyStrategyConfig::BestScore,
            log_level: "info".to_string(),
            management_enabled: true,
            management_bind_addr: "127.0.0.1:8089".parse().unwrap(),
        }
    }
}

impl EngineConfig {
    /// Normalize fields whose documented boundary behavior differs from a
    /// literal read of the value (spec §8 boundary behaviors).
    pub fn normalize(&mut self) {
        if self.retry_count == 0 {
            self.retry_count = 3;
        }
        if self.request_timeout.is_zero() {
            self.request_timeout = Duration::from_secs(30);
        }
        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            self.request_timeout = MAX_REQUEST_TIMEOUT;
        }
    }
}
