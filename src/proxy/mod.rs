//! Proxy Registry, Scoring, Health Monitoring and File Loading

mod health;
mod loader;
mod registry;
mod types;

pub use health::{HealthMonitor, HealthMonitorConfig};
pub use loader::{load_proxies, ParsedProxy, ProxyLoadResult};
pub use registry::{ProxyRegistry, SharedRegistry, Strategy};
pub use types::{
    Location, Outcome, Proxy, ProxyHandle, ProxyMetrics, ProxyView, Quality, Scheme,
};
