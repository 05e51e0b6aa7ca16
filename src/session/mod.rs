//! # Peripheral Session Module
//!
//! Owns the radio link to the telemetry peripheral.
//!
//! This module handles:
//! - The connection state machine shared with the acquisition loop
//! - The [`PeripheralLink`] trait the loop drives
//! - A btleplug-backed implementation ([`ble::BleSession`])

pub mod ble;
pub mod link;

pub use link::{LinkEvent, PeripheralLink};

use std::fmt;

/// Lifecycle of a peripheral session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    NotifyEnabled,
    Running,
    Error,
    Disconnecting,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of this state
    ///
    /// Any state that talks to the peripheral can fail into `Error`;
    /// both `Error` and `Disconnecting` only lead back to `Disconnected`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connected, NotifyEnabled)
                | (NotifyEnabled, Running)
                | (Connecting | Connected | NotifyEnabled | Running, Error)
                | (Running, Disconnecting)
                | (Error | Disconnecting, Disconnected)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::NotifyEnabled => "notify-enabled",
            ConnectionState::Running => "running",
            ConnectionState::Error => "error",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}
