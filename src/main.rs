use argus::cli::{self, Cli, Commands};
use argus::client::{SessionClient, SessionIntegrity, ViolationAlert};
use argus::collector::Aggregator;
use argus::config::{AppConfig, LoggingConfig};
use argus::error::{ArgusError, Result};
use argus::services::{HealthServer, HealthState, SnapshotStreamer};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Collect { core_only, pretty }) => {
            init_logging_simple();
            let collector = AppConfig::load_from(&cli.config_dir)
                .map(|config| config.collector)
                .unwrap_or_default();
            cli::run_collect(&collector, *core_only, *pretty).await?;
        }
        Some(Commands::Device) => {
            init_logging_simple();
            cli::print_device_identity();
        }
        Some(Commands::Monitor {
            interval_ms,
            health_port,
        }) => {
            let mut config = load_config(&cli)?;
            if let Some(interval) = interval_ms {
                config.streaming.interval_ms = *interval;
            }
            if let Some(port) = health_port {
                config.health_port = Some(*port);
            }
            init_logging(&config.logging);
            run_monitor_mode(config).await?;
        }
        None => {
            let config = load_config(&cli)?;
            init_logging(&config.logging);
            run_monitor_mode(config).await?;
        }
    }

    Ok(())
}

/// Resolve configuration from files, environment, and CLI overrides
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.base_url {
        // A CLI-supplied address works without any config file
        Some(url) => match AppConfig::load_from(&cli.config_dir) {
            Ok(mut loaded) => {
                loaded.session.base_url = url.clone();
                loaded
            }
            Err(_) => AppConfig::default_config(url, cli.session_id.clone()),
        },
        None => AppConfig::load_from(&cli.config_dir)?,
    };

    if let Some(id) = &cli.session_id {
        config.session.session_id = Some(id.clone());
    }

    if let Err(problems) = config.validate() {
        for problem in &problems {
            eprintln!("Config error: {}", problem);
        }
        return Err(ArgusError::Internal(format!(
            "invalid configuration ({} problems)",
            problems.len()
        )));
    }

    Ok(config)
}

/// Streaming monitor daemon
async fn run_monitor_mode(config: AppConfig) -> Result<()> {
    info!(
        base_url = %config.session.base_url,
        interval_ms = config.streaming.interval_ms,
        "Starting argus monitor"
    );

    let client = SessionClient::new(config.session.clone())?;
    let aggregator = Arc::new(Aggregator::from_config(&config.collector));

    // Surface violation alerts and integrity scores in the log as they
    // arrive
    client.on("violation_alert", |payload| {
        match serde_json::from_value::<ViolationAlert>(payload.clone()) {
            Ok(alert) => warn!(
                violation_type = %alert.violation_type,
                severity = %alert.severity,
                risk_score = ?alert.risk_score,
                "Violation alert received"
            ),
            Err(e) => warn!("Unparseable violation alert: {}", e),
        }
    });
    client.on("session_integrity", |payload| {
        match serde_json::from_value::<SessionIntegrity>(payload.clone()) {
            Ok(report) => info!(
                integrity_score = report.integrity_score,
                status = %report.status,
                "Session integrity update"
            ),
            Err(e) => warn!("Unparseable session integrity update: {}", e),
        }
    });

    let health_state = Arc::new(HealthState::new().with_client(client.clone()));

    let streamer = Arc::new(SnapshotStreamer::new(
        client.clone(),
        aggregator,
        config.streaming.clone(),
        Arc::clone(&health_state),
    ));

    // Spawn health server when a port is configured
    let health_handle = config.health_port.map(|port| {
        let server = HealthServer::new(Arc::clone(&health_state), port);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Health server error: {}", e);
            }
        })
    });

    // Spawn snapshot streamer
    let streamer_handle = {
        let streamer = Arc::clone(&streamer);
        tokio::spawn(async move {
            if let Err(e) = streamer.run().await {
                error!("Snapshot streamer error: {}", e);
            }
        })
    };

    info!("Monitor is running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    info!("Shutting down...");
    streamer.stop();
    let _ = streamer_handle.await;
    client.disconnect().await;
    if let Some(handle) = health_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    // File logging when a directory is configured (ARGUS_LOG_DIR wins).
    //
    // Important: `tracing_appender::rolling::daily` will panic if it can't
    // create the initial log file, so we must preflight writability.
    let log_dir = std::env::var("ARGUS_LOG_DIR").ok().or_else(|| logging.dir.clone());
    let file_layer = log_dir.and_then(|dir| {
        if std::fs::create_dir_all(&dir).is_err() {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                dir
            );
            return None;
        }

        let test_path = std::path::Path::new(&dir).join(".argus_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                // Daily rotating file appender
                let file_appender = tracing_appender::rolling::daily(&dir, "argus.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive by leaking it (acceptable for long-running process)
                Box::leak(Box::new(guard));

                eprintln!("Logging to: {}/argus.log", dir);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false) // No color codes in file
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir, e
                );
                None
            }
        }
    });

    // Console layer, JSON when configured
    let console_layer = if logging.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
