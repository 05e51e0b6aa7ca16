//! # Error Types
//!
//! Custom error types for BLE Telemetry using `thiserror`.

use thiserror::Error;

/// Main error type for BLE Telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Peripheral unreachable or handshake failure while connecting
    #[error("Connection error: {0}")]
    Connection(String),

    /// Notification-enable write rejected or unacknowledged
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Link failure while waiting for notifications
    #[error("Link error: {0}")]
    Link(String),

    /// Notification payload with the wrong length
    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// Teardown failure (logged, never propagated out of a session)
    #[error("Disconnect error: {0}")]
    Disconnect(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// Whether this error ends the acquisition session
    ///
    /// Only malformed frames are recovered locally; everything else
    /// moves the session to its error state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TelemetryError::MalformedFrame { .. })
    }
}

/// Result type alias for BLE Telemetry
pub type Result<T> = std::result::Result<T, TelemetryError>;
