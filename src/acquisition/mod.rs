//! # Acquisition Module
//!
//! Drives a [`PeripheralLink`] from connect to disconnect and feeds decoded
//! samples into the shared [`SampleWindow`].
//!
//! This module handles:
//! - The session state machine (connect, enable, run, teardown)
//! - Decoding notification frames and dropping malformed ones
//! - Observing the cooperative stop flag once per poll
//!
//! A session error ends acquisition. There is no reconnect: the window
//! keeps its last contents and the loop returns a failed report.

pub mod signal;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{Result, TelemetryError};
use crate::frame::decoder::try_decode_sample;
use crate::frame::protocol::DataCharacteristic;
use crate::session::{ConnectionState, LinkEvent, PeripheralLink};
use crate::window::SampleWindow;

pub use signal::{StopSignal, StopToken};

/// Number of samples between status log messages
const LOG_INTERVAL_SAMPLES: u64 = 100;

/// Static inputs of one acquisition session
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionSettings {
    pub characteristic: DataCharacteristic,

    /// Upper bound of each `wait_for_event`, and so of shutdown latency
    pub poll_timeout: Duration,
}

impl AcquisitionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            characteristic: config.device.characteristic(),
            poll_timeout: config.acquisition.poll_timeout(),
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            characteristic: DataCharacteristic::default(),
            poll_timeout: Duration::from_secs(1),
        }
    }
}

/// Why acquisition ended
#[derive(Debug)]
pub enum AcquisitionOutcome {
    /// The stop signal was observed while running
    Stopped,

    /// A session error moved the loop to its error state
    Failed(TelemetryError),
}

/// Summary returned when the acquisition loop exits
#[derive(Debug)]
pub struct AcquisitionReport {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub samples_pushed: u64,
    pub final_state: ConnectionState,
    /// Every state the session passed through, starting at `Disconnected`
    pub states: Vec<ConnectionState>,
    pub outcome: AcquisitionOutcome,
}

impl AcquisitionReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, AcquisitionOutcome::Failed(_))
    }
}

/// Sole writer of the sample window and sole owner of the link
pub struct AcquisitionLoop<L: PeripheralLink> {
    link: L,
    window: Arc<SampleWindow>,
    settings: AcquisitionSettings,
    stop: StopToken,
    state: ConnectionState,
    states: Vec<ConnectionState>,
    frames_received: u64,
    frames_dropped: u64,
    samples_pushed: u64,
}

impl<L: PeripheralLink> AcquisitionLoop<L> {
    pub fn new(link: L, window: Arc<SampleWindow>, settings: AcquisitionSettings, stop: StopToken) -> Self {
        Self {
            link,
            window,
            settings,
            stop,
            state: ConnectionState::Disconnected,
            states: vec![ConnectionState::Disconnected],
            frames_received: 0,
            frames_dropped: 0,
            samples_pushed: 0,
        }
    }

    /// Run the session to completion
    ///
    /// Always disconnects exactly once and ends in `Disconnected`,
    /// whether the session stopped or failed. The link is dropped on return.
    pub fn run(mut self) -> AcquisitionReport {
        let outcome = match self.run_session() {
            Ok(()) => {
                self.transition(ConnectionState::Disconnecting);
                AcquisitionOutcome::Stopped
            }
            Err(e) => {
                warn!("Acquisition error: {}", e);
                self.transition(ConnectionState::Error);
                AcquisitionOutcome::Failed(e)
            }
        };

        self.link.disconnect();
        self.transition(ConnectionState::Disconnected);
        debug_assert!(self.state.is_terminal());

        info!(
            "Acquisition finished: {} frames received, {} dropped, {} samples pushed",
            self.frames_received, self.frames_dropped, self.samples_pushed
        );

        AcquisitionReport {
            frames_received: self.frames_received,
            frames_dropped: self.frames_dropped,
            samples_pushed: self.samples_pushed,
            final_state: self.state,
            states: self.states,
            outcome,
        }
    }

    fn run_session(&mut self) -> Result<()> {
        self.transition(ConnectionState::Connecting);
        self.link.connect()?;
        self.transition(ConnectionState::Connected);

        info!("Enabling notifications on handle 0x{:04X}...", self.settings.characteristic.handle);
        self.link.enable_notifications(&self.settings.characteristic)?;
        self.transition(ConnectionState::NotifyEnabled);

        self.transition(ConnectionState::Running);
        info!("Waiting for notifications...");

        while !self.stop.is_stop_requested() {
            match self.link.wait_for_event(self.settings.poll_timeout) {
                Ok(LinkEvent::Notification(payload)) => self.handle_frame(&payload),
                Ok(LinkEvent::Timeout) => trace!("Waiting..."),
                Err(e) if !e.is_fatal() => {
                    self.frames_dropped += 1;
                    debug!("Dropping frame: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Stop requested, leaving acquisition loop");
        Ok(())
    }

    fn handle_frame(&mut self, payload: &[u8]) {
        self.frames_received += 1;

        match try_decode_sample(payload) {
            Ok(sample) => {
                debug!("Received sample: {}", sample);
                self.window.push(sample);
                self.samples_pushed += 1;

                if self.samples_pushed % LOG_INTERVAL_SAMPLES == 0 {
                    info!("Received {} samples ({} frames dropped)", self.samples_pushed, self.frames_dropped);
                }
            }
            Err(e) => {
                self.frames_dropped += 1;
                debug!("Dropping frame: {}", e);
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
        self.states.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_sample;
    use crate::session::link::MockPeripheralLink;
    use crate::session::mocks::{ScriptedLink, Step};
    use crate::session::ConnectionState::*;
    use mockall::Sequence;
    use std::thread;
    use std::time::Instant;

    fn settings(poll_timeout_ms: u64) -> AcquisitionSettings {
        AcquisitionSettings {
            poll_timeout: Duration::from_millis(poll_timeout_ms),
            ..AcquisitionSettings::default()
        }
    }

    fn notify(sample: f64) -> Step {
        Step::Notify(encode_sample(sample).to_vec())
    }

    fn wait_for_len(window: &SampleWindow, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while window.len() < len {
            assert!(Instant::now() < deadline, "window never reached {} samples", len);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_malformed_frame_between_valid_frames() {
        let link = ScriptedLink::new(vec![notify(1.25), Step::Notify(vec![1, 2, 3, 4, 5]), notify(2.5)]);
        let calls = link.calls.clone();
        let window = Arc::new(SampleWindow::new(10));
        let stop = StopSignal::new();

        let worker = {
            let window = Arc::clone(&window);
            let token = stop.token();
            thread::spawn(move || AcquisitionLoop::new(link, window, settings(10), token).run())
        };

        wait_for_len(&window, 2);
        stop.request_stop();
        let report = worker.join().unwrap();

        assert_eq!(window.snapshot(), vec![1.25, 2.5]);
        assert_eq!(report.frames_received, 3);
        assert_eq!(report.frames_dropped, 1);
        assert_eq!(report.samples_pushed, 2);
        assert!(matches!(report.outcome, AcquisitionOutcome::Stopped));
        assert_eq!(
            report.states,
            vec![Disconnected, Connecting, Connected, NotifyEnabled, Running, Disconnecting, Disconnected]
        );
        assert_eq!(calls.lock().unwrap().disconnects, 1);
    }

    #[test]
    fn test_samples_keep_arrival_order_and_evict() {
        let mut script: Vec<Step> = [1.0, 2.0, 3.0, 4.0].into_iter().map(notify).collect();
        script.push(Step::Fail("end of script".into()));
        let link = ScriptedLink::new(script);
        let window = Arc::new(SampleWindow::new(3));

        AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert_eq!(window.snapshot(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_timeouts_are_not_errors() {
        let link = ScriptedLink::new(vec![
            Step::Timeout,
            notify(0.5),
            Step::Timeout,
            Step::Timeout,
            Step::Fail("link dropped".into()),
        ]);
        let calls = link.calls.clone();
        let window = Arc::new(SampleWindow::new(5));

        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert_eq!(window.snapshot(), vec![0.5]);
        assert_eq!(report.samples_pushed, 1);
        assert_eq!(calls.lock().unwrap().waits, 5);
    }

    #[test]
    fn test_non_fatal_wait_error_keeps_running() {
        let mut seq = Sequence::new();
        let mut link = MockPeripheralLink::new();
        link.expect_connect().times(1).returning(|| Ok(()));
        link.expect_enable_notifications().times(1).returning(|_| Ok(()));
        link.expect_wait_for_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TelemetryError::MalformedFrame { expected: 8, actual: 3 }));
        link.expect_wait_for_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LinkEvent::Notification(encode_sample(4.0).to_vec())));
        link.expect_wait_for_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TelemetryError::Link("stream ended".into())));
        link.expect_disconnect().times(1).return_const(());

        let window = Arc::new(SampleWindow::new(3));
        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert_eq!(window.snapshot(), vec![4.0]);
        assert_eq!(report.frames_dropped, 1);
        assert_eq!(report.samples_pushed, 1);
        assert!(matches!(report.outcome, AcquisitionOutcome::Failed(TelemetryError::Link(_))));
    }

    #[test]
    fn test_link_error_ends_session_without_retry() {
        let link = ScriptedLink::new(vec![notify(3.0), Step::Fail("link dropped".into()), notify(9.0)]);
        let calls = link.calls.clone();
        let window = Arc::new(SampleWindow::new(5));

        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert!(matches!(report.outcome, AcquisitionOutcome::Failed(TelemetryError::Link(_))));
        assert!(report.is_failure());
        assert_eq!(report.final_state, Disconnected);
        assert_eq!(report.states[report.states.len() - 2], Error);
        assert_eq!(window.snapshot(), vec![3.0]);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.waits, 2);
        assert_eq!(calls.disconnects, 1);
    }

    #[test]
    fn test_connect_failure_skips_subscription() {
        let mut link = MockPeripheralLink::new();
        link.expect_connect()
            .times(1)
            .returning(|| Err(TelemetryError::Connection("address unreachable".into())));
        link.expect_enable_notifications().times(0);
        link.expect_wait_for_event().times(0);
        link.expect_disconnect().times(1).return_const(());

        let window = Arc::new(SampleWindow::new(3));
        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert!(matches!(report.outcome, AcquisitionOutcome::Failed(TelemetryError::Connection(_))));
        assert_eq!(report.final_state, Disconnected);
        assert_eq!(report.states, vec![Disconnected, Connecting, Error, Disconnected]);
        assert!(window.is_empty());
    }

    #[test]
    fn test_subscription_failure_disconnects_once() {
        let link = ScriptedLink::failing_subscribe("write not acknowledged");
        let calls = link.calls.clone();
        let window = Arc::new(SampleWindow::new(3));

        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(10), StopSignal::new().token()).run();

        assert!(matches!(report.outcome, AcquisitionOutcome::Failed(TelemetryError::Subscription(_))));
        assert_eq!(report.states, vec![Disconnected, Connecting, Connected, Error, Disconnected]);
        assert!(window.is_empty());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.subscriptions, vec![DataCharacteristic::default()]);
        assert_eq!(calls.waits, 0);
        assert_eq!(calls.disconnects, 1);
    }

    #[test]
    fn test_session_call_order() {
        let mut seq = Sequence::new();
        let mut link = MockPeripheralLink::new();
        link.expect_connect().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        link.expect_enable_notifications()
            .withf(|c: &DataCharacteristic| c.handle == 0x0012 && c.cccd_handle() == Some(0x0013))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_wait_for_event()
            .withf(|timeout: &Duration| *timeout == Duration::from_millis(250))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LinkEvent::Notification(encode_sample(7.5).to_vec())));
        link.expect_wait_for_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TelemetryError::Link("stream ended".into())));
        link.expect_disconnect().times(1).in_sequence(&mut seq).return_const(());

        let window = Arc::new(SampleWindow::new(3));
        let report = AcquisitionLoop::new(link, Arc::clone(&window), settings(250), StopSignal::new().token()).run();

        assert_eq!(report.samples_pushed, 1);
        assert_eq!(window.snapshot(), vec![7.5]);
    }

    #[test]
    fn test_stop_requested_before_running() {
        let link = ScriptedLink::idle();
        let calls = link.calls.clone();
        let stop = StopSignal::new();
        stop.request_stop();

        let report = AcquisitionLoop::new(link, Arc::new(SampleWindow::new(3)), settings(1000), stop.token()).run();

        assert!(matches!(report.outcome, AcquisitionOutcome::Stopped));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.waits, 0);
        assert_eq!(calls.disconnects, 1);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.device.data_handle = 0x0030;
        config.acquisition.poll_timeout_ms = 500;

        let settings = AcquisitionSettings::from_config(&config);
        assert_eq!(settings.characteristic.handle, 0x0030);
        assert_eq!(settings.poll_timeout, Duration::from_millis(500));
    }
}
