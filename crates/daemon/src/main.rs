// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! uplinkd - The uplink device agent.
//!
//! Keeps the command session to the server alive until SIGINT/SIGTERM.
//! State (upload queue snapshot, lock, pid and log files) lives in the state
//! directory, `~/.local/state/uplink/` by default.
//!
//! Usage:
//!   uplinkd [--config <path>] [--state-dir <path>] [--device-id <id>] [--host <url>]

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use uplinkd::config::{resolve_state_dir, Overrides};
use uplinkd::{AgentConfig, Error};

/// PID filename within the state directory.
const PID_NAME: &str = "uplinkd.pid";
/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "uplinkd.lock";
/// Log filename within the state directory.
const LOG_NAME: &str = "uplinkd.log";
/// Config filename looked up in the state directory when `--config` is absent.
const CONFIG_NAME: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "uplinkd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Device-side command agent")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,

    /// Directory for the queue snapshot, lock and log files
    #[arg(long, value_name = "path")]
    state_dir: Option<PathBuf>,

    /// Device identity, overriding config and environment
    #[arg(long, value_name = "id")]
    device_id: Option<String>,

    /// Server base URL, overriding config and environment
    #[arg(long, value_name = "url")]
    host: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let state_dir = resolve_state_dir(args.state_dir.clone());
    if let Err(e) = fs::create_dir_all(&state_dir) {
        eprintln!("error: cannot create {}: {}", state_dir.display(), e);
        std::process::exit(1);
    }

    setup_logging(&state_dir.join(LOG_NAME), args.verbose);
    tracing::info!("uplinkd starting, state_dir={}", state_dir.display());

    let config = match load_config(&args, &state_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    // Acquire file lock for single instance
    let lock_path = state_dir.join(LOCK_NAME);
    let lock_file = match acquire_lock(&lock_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to acquire lock: {}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let pid_path = state_dir.join(PID_NAME);
    if let Err(e) = write_pid_file(&pid_path) {
        tracing::error!("failed to write PID file: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            cleanup(&pid_path);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            uplinkd::shutdown_signal().await;
            tracing::info!("shutdown requested");
            signal.cancel();
        });
        uplinkd::run_with_config(config, &state_dir, shutdown).await
    });

    cleanup(&pid_path);
    drop(lock_file);
    match result {
        Ok(()) => tracing::info!("uplinkd stopped"),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Args, state_dir: &Path) -> Result<AgentConfig, Error> {
    let default_path = state_dir.join(CONFIG_NAME);
    let file = match &args.config {
        Some(path) => Some(path.as_path()),
        None if default_path.exists() => Some(default_path.as_path()),
        None => None,
    };
    let flags = Overrides {
        host: args.host.clone(),
        device_id: args.device_id.clone(),
        ..Overrides::default()
    };
    AgentConfig::resolve(file, Overrides::from_env(), flags)
}

fn setup_logging(log_path: &Path, verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Try to open log file, fall back to stderr
    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> Result<fs::File, Error> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::AlreadyRunning(lock_path.display().to_string()))?;
    Ok(file)
}

fn write_pid_file(pid_path: &Path) -> std::io::Result<()> {
    fs::write(pid_path, format!("{}", std::process::id()))
}

fn cleanup(pid_path: &Path) {
    let _ = fs::remove_file(pid_path);
}
