use clap::{Parser, Subcommand};

use crate::collector::Aggregator;
use crate::config::CollectorConfig;
use crate::domain::device::{derive_device_id, host_signals};
use crate::error::Result;

#[derive(Parser)]
#[command(name = "argus")]
#[command(author = "Argus Team")]
#[command(version = "0.1.0")]
#[command(about = "Device-signature streaming client for session-integrity monitoring", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base address (http/https/ws/wss); overrides config
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Session id to monitor under (generated when omitted)
    #[arg(short, long)]
    pub session_id: Option<String>,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the streaming monitor daemon
    Monitor {
        /// Snapshot cadence in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Health endpoint port
        #[arg(long)]
        health_port: Option<u16>,
    },
    /// Run one collection pass and print the snapshot
    Collect {
        /// Skip the best-effort auxiliary probes
        #[arg(long)]
        core_only: bool,
        /// Pretty-print the snapshot JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Print the derived device identity
    Device,
}

/// One-shot collection pass printed to stdout
pub async fn run_collect(config: &CollectorConfig, core_only: bool, pretty: bool) -> Result<()> {
    let aggregator = Aggregator::from_config(config);
    let snapshot = if core_only {
        aggregator.collect().await
    } else {
        aggregator.collect_full().await
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", rendered);

    if !snapshot.is_complete() {
        eprintln!(
            "Failed categories: {}",
            snapshot.failed_categories().join(", ")
        );
    }

    Ok(())
}

/// Show the device id and the signals it is derived from
pub fn print_device_identity() {
    println!("device_id: {}", derive_device_id());
    for (key, value) in host_signals() {
        println!("  {}: {}", key, value);
    }
}
