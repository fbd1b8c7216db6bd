//! CryptoSwap CLI and Server Binary
//!
//! This is the main entry point for the CryptoSwap service. It provides
//! commands for initializing and validating configuration, resolving a
//! single rate, and starting the HTTP service.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cli::{Cli, Commands, LogFormatArg};
use config::{
    generate_default_config, load_and_validate, save_config, CacheType, MasterConfig, StorageType,
};
use observability::{init_logging, init_metrics, LogFormat};
use oms::api::{create_api_state, create_router};
use oms::OrderManager;
use rates::{BinancePriceSource, InMemoryPriceCache, PriceCache, RateResolver, RedisPriceCache};
use storage::{InMemoryStore, PostgresStore, Store};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging("swapd", log_format(cli.log_format))?;

    info!("CryptoSwap starting...");
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Start { config, http } => {
            info!("Executing 'start' command");
            start_service(config, http).await
        }
        Commands::Validate { config } => {
            info!("Executing 'validate' command");
            validate_command(config).await
        }
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(output).await
        }
        Commands::Rate { config, symbol } => {
            info!("Executing 'rate' command");
            rate_command(config, &symbol).await
        }
    }
}

fn log_format(arg: LogFormatArg) -> LogFormat {
    match arg {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Json => LogFormat::Json,
        LogFormatArg::Compact => LogFormat::Compact,
    }
}

/// Load a configuration and refuse to continue on validation errors
fn load_checked(config_path: &Path) -> Result<MasterConfig> {
    let (config, report) = load_and_validate(config_path)?;

    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start due to configuration errors");
    }

    Ok(config)
}

async fn build_store(config: &MasterConfig) -> Result<Arc<dyn Store>> {
    match config.storage.storage_type {
        StorageType::Memory => {
            warn!("Using in-memory storage; records are lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageType::Postgres => {
            let pg = config
                .storage
                .postgres
                .as_ref()
                .context("storage.postgres section is required for postgres storage")?;
            let store = PostgresStore::connect(
                &pg.url,
                pg.max_connections,
                Duration::from_secs(pg.connect_timeout_seconds),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to run migrations")?;
            info!("PostgreSQL storage ready");
            Ok(Arc::new(store))
        }
    }
}

async fn build_resolver(config: &MasterConfig) -> Result<RateResolver> {
    let cache: Arc<dyn PriceCache> = match config.cache.cache_type {
        CacheType::Memory => Arc::new(InMemoryPriceCache::new()),
        CacheType::Redis => {
            let redis = config
                .cache
                .redis
                .as_ref()
                .context("cache.redis section is required for redis cache")?;
            Arc::new(
                RedisPriceCache::connect(redis)
                    .await
                    .context("Failed to connect to Redis")?,
            )
        }
    };

    let source = BinancePriceSource::new(
        &config.rates.provider_url,
        Duration::from_millis(config.rates.timeout_ms),
    )
    .context("Failed to build market-data client")?;

    RateResolver::from_config(cache, Arc::new(source), &config.rates)
        .context("Invalid rates configuration")
}

async fn start_service<P: AsRef<Path>>(config_path: P, http_override: Option<u16>) -> Result<()> {
    let config = load_checked(config_path.as_ref())?;

    let http_port = http_override.unwrap_or(config.service.http_port);
    if http_override.is_none() {
        debug!(port = http_port, "Using configured HTTP port");
    }

    if config.metrics.enabled {
        init_metrics(config.metrics.port)?;
    }

    let store = build_store(&config).await?;
    let resolver = build_resolver(&config).await?;
    let manager = OrderManager::from_config(store, Arc::new(resolver), &config);

    let state = create_api_state(manager, &config.service.name);
    let router = create_router(
        state,
        Duration::from_secs(config.service.request_timeout_seconds),
    );

    let addr = format!("{}:{}", config.service.host, http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        service = %config.service.name,
        %addr,
        storage = ?config.storage.storage_type,
        cache = ?config.cache.cache_type,
        "Starting service"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Shutdown signal received");
}

async fn rate_command<P: AsRef<Path>>(config_path: P, symbol: &str) -> Result<()> {
    let config = load_checked(config_path.as_ref())?;
    let resolver = build_resolver(&config).await?;

    let quote = resolver
        .quote(symbol)
        .await
        .with_context(|| format!("Failed to resolve {}", symbol))?;

    println!("{} = {} ({})", quote.symbol, quote.price, quote.origin.as_str());
    Ok(())
}

async fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let (config, report) = match load_and_validate(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    // Print summary
    println!("\n=== Configuration Validation Report ===\n");

    // Defaults
    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    // Warnings
    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    // Errors
    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!("Storage: {:?}", config.storage.storage_type);
    println!("Cache: {:?}", config.cache.cache_type);
    println!("Rate provider: {}", config.rates.provider_url);
    println!(
        "Unverified limits: {} per order, {} per day",
        config.limits.unverified_order_max, config.limits.unverified_daily_volume_max
    );

    Ok(())
}

async fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    // Ensure parent directory exists
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - In-memory storage and cache (PostgreSQL and Redis samples included)");
    println!("  - Binance public ticker as the rate provider");
    println!("  - Limits for unverified accounts");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!("  2. Set required environment variables (POSTGRES_PASSWORD, REDIS_URL)");
    println!(
        "  3. Run 'swapd validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'swapd start --config {:?}' to start the service",
        output_path
    );

    Ok(())
}
