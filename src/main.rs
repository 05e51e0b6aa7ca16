//! # BLE Telemetry
//!
//! Stream numeric telemetry from a BLE peripheral into a rolling sample window.
//!
//! The acquisition thread owns the radio link. The main task is the
//! consumer: it reads a snapshot of the window on every refresh tick and
//! logs a summary, standing in for a plotting surface.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (`--config`, `config/default.toml`, or defaults)
//!    - Set up logging with tracing subscriber (optional rolling log file)
//!    - Start the acquisition thread
//!
//! 2. **Main Loop**
//!    - Summarise the window every `refresh_interval_ms`
//!    - Keep showing the last snapshot if acquisition ends on its own
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Set the stop signal and join the acquisition thread
//!    - Log the acquisition report
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --config config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO ble_telemetry::session::ble: Connecting to 6C:91:36:90:97:D7...
//! INFO ble_telemetry::session::ble: Connected to 6C:91:36:90:97:D7
//! INFO ble_telemetry::acquisition: Waiting for notifications...
//! INFO ble_telemetry: 12 samples | last 2.1043 | min 0.0712 | max 2.9381
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ble_telemetry::acquisition::{AcquisitionOutcome, AcquisitionSettings};
use ble_telemetry::config::{Config, LoggingConfig};
use ble_telemetry::lifecycle::LifecycleController;
use ble_telemetry::session::ble::{BleSession, BleSettings};
use ble_telemetry::window::{SampleWindow, WindowSummary};

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Stream telemetry samples from a BLE peripheral
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let _log_guard = init_logging(&config.logging)?;

    info!("BLE Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let session = BleSession::new(BleSettings::from_config(&config.device)?)?;
    let window = Arc::new(SampleWindow::new(config.acquisition.window_capacity));
    let controller = LifecycleController::start(session, window, AcquisitionSettings::from_config(&config))?;
    let window = controller.window();

    let mut refresh = interval(config.display.refresh_interval());
    let mut last_summary: Option<WindowSummary> = None;
    let mut reported_finish = false;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let summary = window.summary();
                if summary != last_summary {
                    if let Some(s) = summary {
                        info!("{} samples | last {:.4} | min {:.4} | max {:.4}", s.count, s.last, s.min, s.max);
                    }
                    last_summary = summary;
                }

                if !reported_finish && controller.is_finished() {
                    warn!("Acquisition stopped; showing last snapshot until Ctrl+C");
                    reported_finish = true;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // Joining blocks for up to one poll timeout.
    let report = tokio::task::spawn_blocking(move || controller.shutdown())
        .await
        .context("acquisition join task failed")?;

    info!(
        "Total: {} frames received, {} dropped, {} samples",
        report.frames_received, report.frames_dropped, report.samples_pushed
    );
    if let AcquisitionOutcome::Failed(e) = report.outcome {
        warn!("Acquisition ended with error: {}", e);
    }

    Ok(())
}

/// Load the configuration named on the command line, else the default file
/// if present, else built-in defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must be
/// held until exit so the file writer flushes.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: LevelFilter = logging.level.parse().context("invalid log level")?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if logging.file_dir.is_empty() {
        registry.init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&logging.file_dir, "ble-telemetry.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(Some(guard))
}
