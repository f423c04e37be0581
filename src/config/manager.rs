//! Configuration Manager

use std::path::Path;

use anyhow::{bail, Context};

use super::{EngineConfig, OutputFormat};
use crate::Result;

/// Manages engine configuration loading and validation.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is absent.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let mut config: EngineConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config.normalize();
            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let mut config = EngineConfig::default();
            config.normalize();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables, overriding defaults.
    pub fn load_from_env() -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Ok(workers) = std::env::var("CREDCHECK_MAX_WORKERS") {
            config.max_workers = workers
                .parse::<usize>()
                .with_context(|| format!("Invalid CREDCHECK_MAX_WORKERS: {}", workers))?;
        }

        if let Ok(timeout) = std::env::var("CREDCHECK_REQUEST_TIMEOUT") {
            config.request_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid CREDCHECK_REQUEST_TIMEOUT: {}", timeout))?;
        }

        if let Ok(timeout) = std::env::var("CREDCHECK_PROXY_TIMEOUT") {
            config.proxy_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid CREDCHECK_PROXY_TIMEOUT: {}", timeout))?;
        }

        if let Ok(retries) = std::env::var("CREDCHECK_RETRY_COUNT") {
            config.retry_count = retries
                .parse::<usize>()
                .with_context(|| format!("Invalid CREDCHECK_RETRY_COUNT: {}", retries))?;
        }

        if let Ok(valid_only) = std::env::var("CREDCHECK_SAVE_VALID_ONLY") {
            config.save_valid_only = valid_only
                .parse::<bool>()
                .with_context(|| format!("Invalid CREDCHECK_SAVE_VALID_ONLY: {}", valid_only))?;
        }

        if let Ok(output_dir) = std::env::var("CREDCHECK_OUTPUT_DIR") {
            config.output_dir = output_dir.into();
        }

        if let Ok(log_level) = std::env::var("CREDCHECK_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(enabled) = std::env::var("CREDCHECK_MANAGEMENT_ENABLED") {
            config.management_enabled = enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid CREDCHECK_MANAGEMENT_ENABLED: {}", enabled))?;
        }

        if let Ok(bind_addr) = std::env::var("CREDCHECK_MANAGEMENT_BIND_ADDR") {
            config.management_bind_addr = bind_addr
                .parse()
                .with_context(|| format!("Invalid CREDCHECK_MANAGEMENT_BIND_ADDR: {}", bind_addr))?;
        }

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides on top of an already-loaded configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn merge_with_cli_args(
        config: &mut EngineConfig,
        max_workers: Option<usize>,
        request_timeout_secs: Option<u64>,
        proxy_timeout_secs: Option<u64>,
        retry_count: Option<usize>,
        save_valid_only: bool,
        output_format: Option<OutputFormat>,
        output_dir: Option<&str>,
    ) {
        if let Some(workers) = max_workers {
            config.max_workers = workers;
            tracing::info!("CLI override: max workers set to {}", workers);
        }

        if let Some(secs) = request_timeout_secs {
            config.request_timeout = std::time::Duration::from_secs(secs);
            tracing::info!("CLI override: request timeout set to {}s", secs);
        }

        if let Some(secs) = proxy_timeout_secs {
            config.proxy_timeout = std::time::Duration::from_secs(secs);
            tracing::info!("CLI override: proxy timeout set to {}s", secs);
        }

        if let Some(retries) = retry_count {
            config.retry_count = retries;
            tracing::info!("CLI override: retry count set to {}", retries);
        }

        if save_valid_only {
            config.save_valid_only = true;
            tracing::info!("CLI override: saving valid results only");
        }

        if let Some(format) = output_format {
            config.output_format = format;
            tracing::info!("CLI override: output format set to {:?}", format);
        }

        if let Some(dir) = output_dir {
            config.output_dir = dir.into();
            tracing::info!("CLI override: output dir set to {}", dir);
        }

        config.normalize();
    }
}

impl EngineConfig {
    /// Validate the configuration, failing closed on nonsensical values.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            bail!("max_workers must be greater than 0");
        }

        if self.max_workers > 100_000 {
            bail!("max_workers cannot exceed 100,000 for safety");
        }

        if self.request_timeout.as_millis() == 0 {
            bail!("request_timeout must be greater than 0");
        }

        if self.proxy_timeout.as_millis() == 0 {
            bail!("proxy_timeout must be greater than 0");
        }

        if self.health_check_interval.as_secs() == 0 {
            bail!("health_check_interval must be greater than 0");
        }

        if let super::ProxyStrategyConfig::GeoPreferred { country } = &self.proxy_strategy {
            if country.is_empty() {
                bail!("geo_preferred strategy requires a non-empty country code");
            }
        }

        Ok(())
    }
}
