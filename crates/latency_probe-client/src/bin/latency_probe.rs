// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! `latency-probe`: measure, inspect and generate encrypted latency frames.
//!
//! Configuration comes from the environment (`MQTT_ENCRYPTION_KEY`,
//! `NTP_SERVER`, `NTP_CACHE_DURATION`, `NTP_TIMEOUT`, `LATENCY_DB_PATH`);
//! command-line options override it. Logs go to stderr and honor `RUST_LOG`.
//!
//! ```text
//! latency-probe measure 0000...0d9a89d9c5835ce4293204c769b7c0
//! latency-probe measure --subscribed <HEX>
//! latency-probe status
//! latency-probe encrypt '{"iteration":1,"timestamp":"2024-01-01T00:00:00Z"}'
//! latency-probe watch --report-every 60
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use latency_client::cipher;
use latency_client::config::ProbeConfig;
use latency_client::probe::Probe;
use latency_client::refresher::ClockRefresher;
use latency_client::store::{MeasurementKind, NullStore, SqliteStore, Store};

#[derive(Parser, Debug)]
#[command(name = "latency-probe")]
#[command(version, about, long_about = None)]
struct Args {
    /// SNTP authority host (overrides NTP_SERVER)
    #[arg(long, global = true)]
    ntp_server: Option<String>,

    /// Offset validity window in seconds (overrides NTP_CACHE_DURATION)
    #[arg(long, global = true)]
    cache_duration: Option<f64>,

    /// SQLite database file (overrides LATENCY_DB_PATH)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Do not persist measurements
    #[arg(long, global = true)]
    no_db: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decrypt one frame and record its latency
    Measure {
        /// Hex frame: nonce (8 bytes) | LE counter (8 bytes) | ciphertext
        frame: String,

        /// Record as a subscriber arrival instead of a published latency
        #[arg(long)]
        subscribed: bool,
    },
    /// Sync the clock and print its cache state
    Status,
    /// Encrypt a JSON payload into a hex frame
    Encrypt {
        /// Plaintext JSON document
        payload: String,

        /// Nonce as 16 hex characters
        #[arg(long, default_value = "0000000000000000")]
        nonce: String,

        /// Initial block counter
        #[arg(long, default_value_t = 0)]
        counter: u64,
    },
    /// Keep the clock synced in the background until Ctrl-C
    Watch {
        /// Refresh interval in seconds (default: half the validity window)
        #[arg(long)]
        interval: Option<f64>,

        /// Seconds between status log lines
        #[arg(long, default_value_t = 60)]
        report_every: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;

    match args.command {
        Command::Measure { ref frame, subscribed } => {
            let kind = if subscribed {
                MeasurementKind::Subscribed
            } else {
                MeasurementKind::Published
            };
            let probe = Probe::from_config(&config, open_store(&args, &config));
            let body = probe.measure_response(frame, kind).await;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Status => {
            let probe = Probe::from_config(&config, Arc::new(NullStore));
            let report = probe.ntp_status().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Encrypt {
            ref payload,
            ref nonce,
            counter,
        } => {
            let value: serde_json::Value = serde_json::from_str(payload)?;
            let nonce = parse_nonce(nonce)?;
            let plaintext = serde_json::to_vec(&value)?;
            println!("{}", cipher::encrypt(&plaintext, &config.key, nonce, counter));
        }
        Command::Watch {
            interval,
            report_every,
        } => watch(&config, interval, report_every).await?,
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<ProbeConfig, Box<dyn std::error::Error>> {
    let mut config = ProbeConfig::from_env()?;
    if let Some(server) = &args.ntp_server {
        config = config.with_ntp_server(server.clone());
    }
    if let Some(secs) = args.cache_duration {
        config = config.with_cache_duration(positive_secs("--cache-duration", secs)?);
    }
    if let Some(path) = &args.db_path {
        config = config.with_db_path(path.clone());
    }
    Ok(config)
}

fn open_store(args: &Args, config: &ProbeConfig) -> Arc<dyn Store> {
    if args.no_db {
        return Arc::new(NullStore);
    }
    match SqliteStore::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, path = %config.db_path.display(), "database unavailable, measurements will not be saved");
            Arc::new(NullStore)
        }
    }
}

// 16 hex characters, first byte first.
fn parse_nonce(raw: &str) -> Result<[u8; 8], Box<dyn std::error::Error>> {
    let raw = raw.trim();
    if raw.len() != 16 {
        return Err(format!("nonce must be 16 hex characters, got {}", raw.len()).into());
    }
    Ok(u64::from_str_radix(raw, 16)?.to_be_bytes())
}

fn positive_secs(flag: &str, secs: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("{flag} must be a positive number of seconds").into());
    }
    Ok(Duration::try_from_secs_f64(secs)?)
}

async fn watch(
    config: &ProbeConfig,
    interval: Option<f64>,
    report_every: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let probe = Probe::from_config(config, Arc::new(NullStore));
    let clock = probe.clock().clone();

    let mut refresher = ClockRefresher::new(clock.clone());
    if let Some(secs) = interval {
        refresher = refresher.interval(positive_secs("--interval", secs)?);
    }
    info!(
        interval_s = refresher.refresh_interval().as_secs_f64(),
        "watching clock, press Ctrl-C to stop"
    );
    let handle = refresher.spawn();

    let mut report = tokio::time::interval(Duration::from_secs(report_every.max(1)));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let status = clock.status();
                info!(
                    state = ?status.status,
                    offset_s = ?status.offset,
                    age_s = ?status.age_seconds,
                    attempts = status.sync_attempts,
                    failures = status.sync_failures,
                    "clock status"
                );
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
