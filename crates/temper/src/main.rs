//! temper
//!
//! Polls a TEMPer USB thermometer and logs each reading.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use protocol::{PRODUCT_ID, VENDOR_ID};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use temper::config::{TemperConfig, expand_path};
use temper::{Poller, RusbBus, RusbDevice, Session, setup_logging};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "temper")]
#[command(author, version, about = "Read temperatures from a TEMPer USB thermometer")]
#[command(long_about = "
Reads the temperature from a TEMPer USB thermometer (0c45:7401) and logs
it periodically until interrupted with Ctrl+C.

EXAMPLES:
    # Poll with default settings (every 300ms)
    temper

    # Print a single reading and exit
    temper --once

    # Poll every second, ten times
    temper --interval 1000 --count 10

    # List attached thermometers
    temper --list-devices

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/temper-usb/temper.toml
    3. /etc/temper-usb/temper.toml
    4. Built-in defaults

Accessing the device usually requires root or a udev rule granting access
to 0c45:7401.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List attached thermometers and exit
    #[arg(long)]
    list_devices: bool,

    /// Print one reading to stdout and exit
    #[arg(long, conflicts_with = "count")]
    once: bool,

    /// Stop after this many polls
    #[arg(short = 'n', long, value_name = "N")]
    count: Option<u64>,

    /// Delay between readings in milliseconds
    #[arg(short, long, value_name = "MS")]
    interval: Option<u64>,

    /// USB transfer timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = TemperConfig::default();
        let path = TemperConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        TemperConfig::load(Some(expand_path(path))).context("Failed to load configuration")?
    } else {
        TemperConfig::load_or_default()
    };

    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }
    if let Some(interval) = args.interval {
        config.poll.interval_ms = interval;
    }
    if let Some(timeout) = args.timeout {
        config.device.timeout_ms = timeout;
    }
    config.validate().context("Invalid settings")?;

    setup_logging(&config.general.log_level).context("Failed to setup logging")?;

    info!("temper v{}", env!("CARGO_PKG_VERSION"));

    if args.list_devices {
        return list_devices();
    }

    let bus = RusbBus::new().context("Failed to initialize libusb")?;
    let mut session =
        Session::open(&bus, config.session_config()).context("Failed to get TEMPer device")?;

    if args.once {
        let temperature = session
            .get_temperature()
            .context("Failed to get temperature")?;
        println!("{:.2}", temperature);
        session.release();
        return Ok(());
    }

    run_poller(session, &config, args.count).await
}

/// List attached thermometers and exit
fn list_devices() -> Result<()> {
    let bus = RusbBus::new().context("Failed to initialize libusb")?;
    let devices = bus
        .list(VENDOR_ID, PRODUCT_ID)
        .context("Failed to list USB devices")?;

    if devices.is_empty() {
        println!("No TEMPer devices found.");
        return Ok(());
    }

    println!("Found {} TEMPer device(s):\n", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {:04x}:{:04x} - {} {}",
            index,
            device.vendor_id,
            device.product_id,
            device.manufacturer.as_deref().unwrap_or("Unknown Manufacturer"),
            device.product.as_deref().unwrap_or("Unknown Product")
        );
        println!(
            "      Bus {:03} Device {:03}",
            device.bus_number, device.address
        );
    }
    if devices.len() > 1 {
        println!("\nOnly device [0] is used.");
    }

    Ok(())
}

/// Poll on a worker thread until Ctrl+C or the poll limit
async fn run_poller(
    session: Session<RusbDevice>,
    config: &TemperConfig,
    count: Option<u64>,
) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let worker = Poller::new(session, config.poll_interval())
        .with_max_polls(count)
        .spawn(shutdown.clone(), |temperature| info!("{:.2}", temperature))
        .context("Failed to spawn poller thread")?;

    let mut join = tokio::task::spawn_blocking(move || worker.join());

    let joined = tokio::select! {
        joined = &mut join => joined,
        res = signal::ctrl_c() => {
            match res {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Error waiting for Ctrl+C: {}", e),
            }
            shutdown.store(true, Ordering::SeqCst);
            join.await
        }
    };

    let stats = joined
        .context("Poller task failed")?
        .map_err(|_| anyhow!("Poller thread panicked"))?;

    if stats.readings == 0 && stats.failures > 0 {
        return Err(anyhow!("No temperature could be read ({} failures)", stats.failures));
    }
    Ok(())
}
