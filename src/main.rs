//! credcheck - Credential Validation Engine CLI
//!
//! Checks large lists of `username:password` combos against site-specific
//! recipes, rotating upstream proxies and classifying each attempt.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credcheck::config::{load_configs_from_dir, ConfigManager, OutputFormat};
use credcheck::Engine;

/// CLI arguments for credcheck.
#[derive(Parser, Debug)]
#[command(name = "credcheck")]
#[command(about = "High-throughput credential validation engine with proxy rotation")]
#[command(version)]
pub struct CliArgs {
    /// Directory of check-config recipe files (repeatable).
    #[arg(long = "configs", required = true)]
    pub configs: Vec<PathBuf>,

    /// Combo list file (`username:password` per line).
    #[arg(long, required = true)]
    pub combos: PathBuf,

    /// Proxy list file (`host:port[:scheme]` per line).
    #[arg(long)]
    pub proxies: Option<PathBuf>,

    /// Output directory for result sinks.
    #[arg(long, default_value = "results")]
    pub output: PathBuf,

    /// Worker pool size.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Enable automatic proxy scraping (collaborator, off by default).
    #[arg(long)]
    pub auto_scrape: bool,

    /// Only persist successful attempts.
    #[arg(long)]
    pub valid_only: bool,

    /// Per-attempt request timeout, in seconds.
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Per-probe proxy timeout, in seconds.
    #[arg(long)]
    pub proxy_timeout: Option<u64>,

    /// Output record format.
    #[arg(long, value_enum, default_value = "txt")]
    pub format: CliOutputFormat,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliOutputFormat {
    Txt,
    Json,
    Csv,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(v: CliOutputFormat) -> Self {
        match v {
            CliOutputFormat::Txt => OutputFormat::Txt,
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Csv => OutputFormat::Csv,
        }
    }
}

const EXIT_OK: u8 = 0;
const EXIT_BAD_ARGS: u8 = 2;
const EXIT_INPUT_MISSING: u8 = 3;
const EXIT_NO_PROXY_AVAILABLE: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = init_tracing(&args.log_level) {
        eprintln!("fatal: failed to initialize logging: {e}");
        return ExitCode::from(EXIT_BAD_ARGS);
    }

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:?}");
            ExitCode::from(EXIT_BAD_ARGS)
        }
    }
}

async fn run(args: CliArgs) -> Result<u8> {
    info!("starting credcheck v{}", env!("CARGO_PKG_VERSION"));

    if !args.combos.exists() {
        error!(path = %args.combos.display(), "combo file not found");
        return Ok(EXIT_INPUT_MISSING);
    }
    for dir in &args.configs {
        if !dir.exists() {
            error!(path = %dir.display(), "config directory not found");
            return Ok(EXIT_INPUT_MISSING);
        }
    }
    if let Some(proxies) = &args.proxies {
        if !proxies.exists() {
            error!(path = %proxies.display(), "proxy file not found");
            return Ok(EXIT_INPUT_MISSING);
        }
    }

    let mut config = ConfigManager::load_from_env()?;
    ConfigManager::merge_with_cli_args(
        &mut config,
        args.workers,
        args.request_timeout,
        args.proxy_timeout,
        None,
        args.valid_only,
        Some(args.format.into()),
        Some(args.output.to_string_lossy().as_ref()),
    );
    config.auto_scrape_proxies = args.auto_scrape;
    config.validate().context("configuration validation failed")?;

    let mut engine = Engine::new(config)?;
    engine.load_combos(&args.combos).await?;

    let mut configs = Vec::new();
    for dir in &args.configs {
        configs.extend(load_configs_from_dir(dir).await?);
    }
    let all_require_proxy = !configs.is_empty() && configs.iter().all(|c| c.requires_proxy);
    engine.load_configs(configs);

    if let Some(proxies) = &args.proxies {
        engine.load_proxies(proxies).await?;
    }

    if all_require_proxy && args.proxies.is_none() {
        warn!("all configs require a proxy but no --proxies file was given");
        return Ok(EXIT_NO_PROXY_AVAILABLE);
    }

    engine.start().await?;
    info!("engine running; press Ctrl+C to stop");
    engine.run_until_signal().await?;

    let stats = engine.stats().await;
    info!(
        valid = stats.valid,
        invalid = stats.invalid,
        errors = stats.errors,
        cpm = stats.current_cpm,
        "run complete"
    );

    Ok(EXIT_OK)
}

fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
