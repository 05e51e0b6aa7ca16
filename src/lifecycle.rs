//! # Lifecycle Module
//!
//! Starts the acquisition loop on its own thread and stops it cooperatively.
//!
//! Shutdown sets the stop signal and joins. The loop notices the signal
//! after its current `wait_for_event` returns, so the worst-case latency
//! is one poll timeout.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::acquisition::{
    AcquisitionLoop, AcquisitionOutcome, AcquisitionReport, AcquisitionSettings, StopSignal,
};
use crate::error::{Result, TelemetryError};
use crate::session::{ConnectionState, PeripheralLink};
use crate::window::SampleWindow;

/// Name of the acquisition thread
pub const ACQUISITION_THREAD_NAME: &str = "acquisition";

/// Owner of the stop signal and the acquisition thread
#[derive(Debug)]
pub struct LifecycleController {
    stop: StopSignal,
    window: Arc<SampleWindow>,
    worker: JoinHandle<AcquisitionReport>,
}

impl LifecycleController {
    /// Spawn the acquisition loop for `link`
    ///
    /// The link moves onto the acquisition thread and is never touched
    /// from any other thread.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned
    pub fn start<L>(link: L, window: Arc<SampleWindow>, settings: AcquisitionSettings) -> Result<Self>
    where
        L: PeripheralLink + 'static,
    {
        let stop = StopSignal::new();
        let token = stop.token();
        let loop_window = Arc::clone(&window);

        let worker = thread::Builder::new()
            .name(ACQUISITION_THREAD_NAME.to_string())
            .spawn(move || AcquisitionLoop::new(link, loop_window, settings, token).run())?;

        info!("Acquisition thread started (poll timeout {} ms)", settings.poll_timeout.as_millis());
        Ok(Self { stop, window, worker })
    }

    /// Read handle for consumers
    pub fn window(&self) -> Arc<SampleWindow> {
        Arc::clone(&self.window)
    }

    /// Whether the loop has already exited on its own
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Request a stop and wait for the acquisition thread to join
    ///
    /// A panic on the acquisition thread is reported as a failed
    /// outcome instead of being propagated.
    pub fn shutdown(self) -> AcquisitionReport {
        self.stop.request_stop();
        info!("Stop requested, waiting for acquisition thread...");

        match self.worker.join() {
            Ok(report) => report,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("Acquisition thread panicked: {}", message);

                AcquisitionReport {
                    frames_received: 0,
                    frames_dropped: 0,
                    samples_pushed: 0,
                    final_state: ConnectionState::Disconnected,
                    states: Vec::new(),
                    outcome: AcquisitionOutcome::Failed(TelemetryError::Link(format!(
                        "acquisition thread panicked: {}",
                        message
                    ))),
                }
            }
        }
    }
}
