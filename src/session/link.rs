//! Trait abstraction for peripheral link operations to enable testing

use std::time::Duration;

use crate::error::Result;
use crate::frame::protocol::DataCharacteristic;

/// Outcome of one bounded wait on the link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A notification payload from the data characteristic
    Notification(Vec<u8>),

    /// The timeout elapsed with nothing received
    Timeout,
}

/// Blocking operations on one peripheral connection
///
/// The acquisition thread owns the link exclusively; implementations
/// only need to be `Send` so they can move onto that thread.
#[cfg_attr(test, mockall::automock)]
pub trait PeripheralLink: Send {
    /// Establish the link (`Connection` error on failure)
    fn connect(&mut self) -> Result<()>;

    /// Write the notification-enable value to the characteristic's CCCD
    /// (`Subscription` error if rejected or unacknowledged)
    fn enable_notifications(&mut self, characteristic: &DataCharacteristic) -> Result<()>;

    /// Block up to `timeout` for the next notification
    ///
    /// A timeout is [`LinkEvent::Timeout`], not an error.
    fn wait_for_event(&mut self, timeout: Duration) -> Result<LinkEvent>;

    /// Tear the link down
    ///
    /// Idempotent. Failures are logged by the implementation and never
    /// returned.
    fn disconnect(&mut self);
}
