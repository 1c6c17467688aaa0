//! Main entry point for the parlor-queue matchmaking service
//!
//! Loads configuration, starts the gateway and the matchmaker, and shuts
//! them down gracefully on SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use parlor_queue::config::{validate_config, AppConfig};
use parlor_queue::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Parlor Queue - pairwise matchmaking queue
#[derive(Parser)]
#[command(
    name = "parlor-queue",
    version,
    about = "A pairwise matchmaking queue behind an authenticated HTTP gateway",
    long_about = "Parlor Queue keeps a queue of waiting players in a shared store, pairs \
                 players with matching criteria on a fixed interval, and evicts players \
                 that stop polling."
)]
struct Args {
    #[arg(short, long, value_name = "FILE", help = "TOML file with service settings")]
    config: Option<PathBuf>,

    #[arg(short, long, value_name = "LEVEL", help = "Log level for the queue service")]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override HTTP gateway port")]
    port: Option<u16>,

    #[arg(long, value_name = "URL", help = "Use the Redis player store at URL")]
    redis_url: Option<String>,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    debug: bool,

    /// Check the merged configuration and exit
    #[arg(long)]
    dry_run: bool,
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("could not install log subscriber: {}", e))?;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT received");
        },
        _ = terminate => {
            info!("SIGTERM received");
        },
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Parlor Queue Matchmaking Service");
    info!(
        "   {} on port {} (log level {})",
        config.service.name, config.service.port, config.service.log_level
    );
    info!(
        "   Store: {} (collection '{}', ttl {}s)",
        if config.store.redis_url.is_some() {
            "redis"
        } else {
            "in-memory"
        },
        config.store.collection,
        config.store.ttl_seconds
    );
    info!("   Matchmaker interval: {}ms", config.matchmaking.interval_ms);
    info!("   Player timeout: {}ms", config.matchmaking.player_timeout_ms);
    info!(
        "   Default criteria: '{}'",
        config.matchmaking.default_criteria
    );
}

/// Load and merge configuration from file, environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    // Command line wins over file and environment
    if let Some(level) = &args.log_level {
        config.service.log_level = level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.port {
        config.service.port = port;
    }

    if let Some(redis_url) = &args.redis_url {
        config.store.redis_url = Some(redis_url.clone());
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        display_startup_banner(&config);
        info!("Configuration is valid, not starting (dry run)");
        return Ok(());
    }

    display_startup_banner(&config);

    let mut app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Could not build queue service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Could not start queue service: {}", e);
        std::process::exit(1);
    }

    info!("Parlor Queue is running, press Ctrl+C to shut down");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    if let Err(e) = app_state.shutdown().await {
        warn!("Shutdown did not complete cleanly: {}", e);
    }

    info!("Parlor Queue stopped");
    Ok(())
}
