//! bindkeysd: system-wide hotkey daemon
//!
//! Loads a bindkeys-style rc file, spreads the parsed bindings across a
//! pool of low-level keyboard hooks, and runs until a shutdown signal
//! arrives. A watchdog thread and a session-change listener clear the
//! phantom "stuck key" state the OS hook mechanism is known to leave
//! behind.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bindkeysd::binding::BindingTable;
use bindkeysd::config::{Config, DEFAULT_RC};
use bindkeysd::dispatch::{CommandRunner, ShellRunner};
use bindkeysd::hook::{HookPool, SessionWatcher, Watchdog};
use bindkeysd::lifecycle::ShutdownSignal;
use bindkeysd::platform::{self, OsKeyStateProbe};
use bindkeysd::parser;

#[derive(Debug, Parser)]
#[command(name = "bindkeysd", version, about = "System-wide hotkey daemon")]
struct Cli {
    /// More information on what the daemon is doing
    #[arg(short, long)]
    verbose: bool,

    /// Print the default rc file and exit
    #[arg(short, long)]
    defaults: bool,

    /// Use FILE instead of ~/.bindkeysrc
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parse the rc file, print the bindings as JSON, and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if cli.defaults {
        print!("{DEFAULT_RC}");
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "bindkeysd starting"
    );

    // Load configuration
    let config = Config::load(cli.config)?;
    if config.ensure_rc()? {
        info!(path = ?config.rc_path, "wrote default rc file");
    }

    // A broken rc file must not kill the engine: run with no active
    // bindings and let the user fix the file.
    let table = match parser::parse_file(&config.rc_path) {
        Ok(table) => table,
        Err(e) => {
            warn!(%e, "config parse failed; continuing with no active bindings");
            BindingTable::new()
        }
    };
    info!(bindings = table.len(), path = ?config.rc_path, "configuration loaded");

    if cli.check {
        for hotkey in table.iter() {
            println!("{}", serde_json::to_string(hotkey)?);
        }
        return Ok(());
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
    let pool = Arc::new(HookPool::new(runner, platform::default_backend()));

    // Spread the bindings across the pool so one silently broken hook
    // only takes down its share of them.
    for part in table.partition(pool.size()) {
        if !part.is_empty() {
            pool.register(part)?;
        }
    }
    pool.start();

    let watchdog = Watchdog::new().spawn(Arc::clone(&pool), Arc::new(OsKeyStateProbe))?;
    let session = match SessionWatcher::spawn(Arc::clone(&pool)) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(%e, "session notifications unavailable; relying on watchdog alone");
            None
        }
    };

    let shutdown = ShutdownSignal::new();
    info!("daemon initialized, waiting for hotkeys");
    let outcome = shutdown.wait().await;

    // Cleanup runs even when the signal handler could not be registered.
    info!("shutting down...");
    pool.stop();
    watchdog.stop();
    if let Some(session) = session {
        session.stop();
    }
    info!("bindkeysd stopped");

    outcome.context("shutdown signal handler failed")?;
    Ok(())
}
