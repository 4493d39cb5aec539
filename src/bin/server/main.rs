//! Vision Analytics HTTP Server
//!
//! This binary serves the dashboard API: dataset views with calendar
//! grouping and forecasting, table listings, and record endpoints.
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration file
//! - `datasets` - List registered datasets
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` flag
//! 2. `VISION_CONFIG` environment variable (path to TOML file)
//! 3. `./application.toml` in current directory
//! 4. Default configuration

mod config;

use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::signal;
use tracing::{debug, info, warn};
use vision_analytics::config::ApplicationConfig;
use vision_analytics::http::{build_router, AppState};
use vision_analytics::registry::DatasetDescriptor;

// =============================================================================
// CLI Definition
// =============================================================================

/// Vision Analytics - business dashboard backend
#[derive(Parser)]
#[command(name = "vision-analytics")]
#[command(version)]
#[command(about = "Dashboard backend with calendar-bucketed dataset aggregation")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides VISION_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,

    /// List registered datasets
    Datasets {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

/// Load configuration and apply CLI overrides
fn resolve_config(cli: &Cli) -> Result<ApplicationConfig, Box<dyn std::error::Error>> {
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen.clone();
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;
    let registry = config.build_registry()?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.server.listen_addr);
    println!("  Log level: {}", config.server.log_level);
    println!();
    println!("Storage:");
    match &config.storage.seed_file {
        Some(path) => println!("  Seed file: {}", path.display()),
        None if config.storage.generate_sample_data => println!(
            "  Sample data: {} rows per dataset, {} projects (seed {})",
            config.storage.sample_rows, config.storage.sample_projects, config.storage.sample_seed
        ),
        None => println!("  Empty tables"),
    }
    println!("  Fetch timeout: {}s", config.storage.fetch_timeout_secs);
    println!();
    println!("Forecast:");
    println!("  Enabled: {}", config.forecast.enabled);
    if config.forecast.enabled {
        println!(
            "  Command: {} {}",
            config.forecast.command,
            config.forecast.args.join(" ")
        );
        println!("  Timeout: {}s", config.forecast.timeout_secs);
    }
    println!();
    println!("Security:");
    match &config.security.required_origin {
        Some(origin) => println!("  Required origin: {}", origin),
        None => println!("  Required origin: (any)"),
    }
    println!();
    println!("Datasets: {} registered", registry.len());

    Ok(())
}

/// Print registered datasets
fn cmd_datasets(cli: &Cli, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;
    let registry = config.build_registry()?;

    if format == "json" {
        let datasets: Vec<_> = registry.iter().map(describe_json).collect();
        println!("{}", serde_json::to_string_pretty(&datasets)?);
    } else {
        println!("Registered Datasets");
        println!("===================");
        for d in registry.iter() {
            let metrics: Vec<_> = d
                .metrics()
                .iter()
                .map(|m| format!("{}->{}", m.field(), m.label()))
                .collect();
            println!();
            println!("{} ({})", d.name(), d.table());
            println!("  Date field: {}", d.date_field().unwrap_or("-"));
            let metrics = if metrics.is_empty() {
                "-".to_string()
            } else {
                metrics.join(", ")
            };
            println!("  Metrics: {}", metrics);
            println!("  Forecast field: {}", d.forecast_field().unwrap_or("-"));
        }
    }

    Ok(())
}

fn describe_json(d: &DatasetDescriptor) -> serde_json::Value {
    serde_json::json!({
        "name": d.name(),
        "table": d.table(),
        "fields": d.fields(),
        "date_field": d.date_field(),
        "metrics": d
            .metrics()
            .iter()
            .map(|m| serde_json::json!({ "field": m.field(), "label": m.label() }))
            .collect::<Vec<_>>(),
        "forecast_field": d.forecast_field(),
    })
}

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown signal handler
///
/// Handles signal registration failures by logging a warning and waiting
/// indefinitely (the server must then be killed forcefully).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::Datasets { format }) => return cmd_datasets(&cli, format),
        Some(Commands::Start) | None => {},
    }

    let config = resolve_config(&cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Vision Analytics Server v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        listen_addr = %config.server.listen_addr,
        forecast_enabled = config.forecast.enabled,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        datasets = state.query.registry().len(),
        storage = state.query.storage().backend_id(),
        "Application state initialized"
    );

    let app = build_router(state);

    let addr: SocketAddr = config.listen_addr()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
