//! credcheck Library
//!
//! A high-throughput credential-validation engine: a worker pool checks
//! `username:password` combos against site-specific recipes, rotating a
//! pool of upstream proxies and classifying each attempt as valid, invalid,
//! or error.

pub mod checker;
pub mod combo;
pub mod config;
pub mod engine;
pub mod management;
pub mod metrics;
pub mod proxy;
pub mod shutdown;
pub mod sinks;
pub mod transport;
pub mod workflow;

pub use config::{ConfigManager, EngineConfig};
pub use engine::Engine;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the engine.
pub type Result<T> = anyhow::Result<T>;
