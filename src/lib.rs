//! # BLE Telemetry Library
//!
//! Stream numeric telemetry from a BLE peripheral into a rolling sample window.
//!
//! The peripheral (an nRF52840 running the companion firmware) notifies one
//! little-endian `f64` per frame. This library provides the acquisition
//! pipeline: the peripheral session, frame decoding, the shared bounded
//! window, and the thread that ties them together.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ble_telemetry::acquisition::AcquisitionSettings;
//! use ble_telemetry::config::Config;
//! use ble_telemetry::lifecycle::LifecycleController;
//! use ble_telemetry::session::ble::{BleSession, BleSettings};
//! use ble_telemetry::window::SampleWindow;
//!
//! # fn main() -> ble_telemetry::error::Result<()> {
//! let config = Config::default();
//! let session = BleSession::new(BleSettings::from_config(&config.device)?)?;
//! let window = Arc::new(SampleWindow::new(config.acquisition.window_capacity));
//!
//! let controller = LifecycleController::start(session, window, AcquisitionSettings::from_config(&config))?;
//! println!("{:?}", controller.window().snapshot());
//! let report = controller.shutdown();
//! println!("{} samples", report.samples_pushed);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod config;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod session;
pub mod window;
