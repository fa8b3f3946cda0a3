//! usbtree
//!
//! Prints the USB device tree of the host and, in watch mode, keeps it in
//! sync with the bus, reporting every attach, detach and skipped device.

mod bridge;
mod config;
mod dump;
mod poller;

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use config::UsbTreeConfig;
use poller::Poller;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use topology::{LibUsbTransport, TopologyListener, TopologyManager};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "usbtree")]
#[command(author, version, about = "Show the USB device topology")]
#[command(long_about = "
Reads the descriptors of every USB device on the host and prints them as a
tree of hubs and ports below a virtual root hub.

EXAMPLES:
    # Print the tree once
    usbtree

    # Include full descriptor dumps
    usbtree --verbose

    # Machine-readable output
    usbtree --json

    # Follow hotplug changes until Ctrl+C
    usbtree --watch --interval-ms 500

CONFIGURATION:
    usbtree looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbtree/usbtree.toml
    3. /etc/usbtree/usbtree.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Keep rescanning and print topology changes until Ctrl+C
    #[arg(short, long)]
    watch: bool,

    /// Rescan interval for --watch, overrides the configuration
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Print the tree as JSON
    #[arg(long)]
    json: bool,

    /// Print descriptor dumps under every device
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = UsbTreeConfig::default();
        let path = UsbTreeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        UsbTreeConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        UsbTreeConfig::load_or_default()
    };
    if let Some(interval_ms) = args.interval_ms {
        config.scan.poll_interval_ms = interval_ms;
    }
    config.validate().context("Invalid configuration")?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbtree v{}", env!("CARGO_PKG_VERSION"));

    let transport = LibUsbTransport::new()
        .context("Failed to initialize libusb")?
        .with_skip_root_hubs(config.scan.skip_root_hubs);
    let manager = Arc::new(TopologyManager::new(transport));

    let report = manager
        .rescan_transport()
        .context("Failed to scan the USB bus")?;
    if !report.failed.is_empty() {
        warn!("{} device(s) could not be read", report.failed.len());
    }

    if args.json {
        println!("{}", dump::render_json(manager.root_hub())?);
    } else {
        let verbose = args.verbose || config.scan.dump_descriptors;
        print!("{}", dump::render_tree(manager.root_hub(), verbose));
    }

    if args.watch {
        run_watch(manager, config.scan.poll_interval()).await?;
    }

    Ok(())
}

/// Poll the bus and print changes until Ctrl+C
async fn run_watch(
    manager: Arc<TopologyManager<LibUsbTransport>>,
    interval: Duration,
) -> Result<()> {
    let (listener, events) = bridge::create_event_channel();
    let listener: Arc<dyn TopologyListener> = Arc::new(listener);
    manager
        .register_listener(listener.clone())
        .context("Failed to register event listener")?;

    let poller = Poller::spawn(manager.clone(), interval)?;
    info!("Watching for changes, press Ctrl+C to stop");

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", event),
                Err(_) => break,
            },
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    // Unregister first so the poller never blocks on a full channel
    manager
        .unregister_listener(&listener)
        .context("Failed to unregister event listener")?;
    drop(events);

    let cycles = tokio::task::spawn_blocking(move || poller.stop())
        .await
        .context("Poller shutdown task failed")??;
    info!("Stopped after {} rescans", cycles);
    Ok(())
}
