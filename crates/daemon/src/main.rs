//! ldapdir daemon entry point.
//!
//! Loads configuration, wires the LDAP client, cache store, catalog and
//! assembler together, starts the web server and the cache warming
//! scheduler, and handles graceful shutdown.

mod scheduler;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ldapdir_core::cache::{SectionCache, SqliteCacheStore};
use ldapdir_core::catalog::Catalog;
use ldapdir_core::config::AppConfig;
use ldapdir_core::directory::LdapDirectory;
use ldapdir_core::identity;
use ldapdir_core::DirectoryAssembler;
use ldapdir_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// ldapdir directory daemon.
#[derive(Parser, Debug)]
#[command(
    name = "ldapdir-daemon",
    version,
    about = "Serves an LDAP-backed organizational directory"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and resolve configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables in config")?;
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  ldapdir daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("LDAP URL      : {}", config.ldap.url);
    info!("User base DN  : {}", config.ldap.base_dn);
    info!("Catalog       : {}", config.directory.catalog_file.display());
    info!("Locale        : {}", config.directory.locale);
    info!("Warm interval : {}s", config.daemon.warm_interval_secs);
    info!("Web listen    : {}", config.web.listen);
    info!("Data dir      : {}", config.daemon.data_dir.display());
    info!("Log level     : {}", log_level);
    info!("========================================");

    // Ensure data directory exists
    std::fs::create_dir_all(&config.daemon.data_dir).context("failed to create data directory")?;

    // Cache store
    let cache_path = config.daemon.cache_db_path();
    let store = SqliteCacheStore::new(&cache_path).context("failed to open cache database")?;
    let cache = SectionCache::new(Arc::new(store), &config.directory.locale);
    info!("Cache initialized at {}", cache_path.display());

    // Catalog
    let catalog =
        Catalog::load(&config.directory.catalog_file).context("failed to load section catalog")?;
    info!(
        "Catalog loaded: {} sections, {} tweaks",
        catalog.sections().len(),
        catalog.tweaks().len()
    );

    // Directory client and profile links
    let directory = Arc::new(LdapDirectory::from_config(&config.ldap));
    let profiles =
        identity::resolver_from_config(&config).context("failed to load profile mapping")?;

    let assembler = Arc::new(
        DirectoryAssembler::from_config(&config, directory, cache, catalog, profiles)
            .context("failed to initialize directory assembler")?,
    );
    info!("Directory assembler initialized");

    let shutdown = Arc::new(tokio::sync::Notify::new());

    // Start web server in background
    let web_server = WebServer::new(config.clone(), assembler.clone());
    let listen_addr = config.web.listen.clone();
    let web_shutdown = shutdown.clone();
    let web_handle = tokio::spawn(async move {
        let signal = async move { web_shutdown.notified().await };
        if let Err(e) = web_server.start(&listen_addr, signal).await {
            error!("Web server error: {}", e);
        }
    });

    // Start the warming scheduler unless disabled
    let scheduler_handle = if config.daemon.warm_interval_secs > 0 {
        let sched = scheduler::Scheduler::new(
            assembler.clone(),
            std::time::Duration::from_secs(config.daemon.warm_interval_secs),
            config.directory.invalidate_secs,
        );
        let scheduler_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            sched.run(scheduler_shutdown).await;
        }))
    } else {
        info!("cache warming disabled");
        None
    };

    // Wait for shutdown signal
    signals::wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    shutdown.notify_waiters();

    if let Some(handle) = scheduler_handle {
        match tokio::time::timeout(std::time::Duration::from_secs(10), handle).await {
            Ok(Ok(())) => info!("scheduler stopped gracefully"),
            Ok(Err(e)) => warn!("scheduler task error: {}", e),
            Err(_) => warn!("scheduler did not stop within 10s, forcing shutdown"),
        }
    }

    match tokio::time::timeout(std::time::Duration::from_secs(10), web_handle).await {
        Ok(Ok(())) => info!("web server stopped gracefully"),
        Ok(Err(e)) => warn!("web server task error: {}", e),
        Err(_) => warn!("web server did not stop within 10s"),
    }

    info!("ldapdir daemon stopped.");
    Ok(())
}
