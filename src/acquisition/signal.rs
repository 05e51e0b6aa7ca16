//! Cooperative stop flag shared between the controller and the loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owning side of the stop flag
///
/// Only the holder of a `StopSignal` can request a stop. The acquisition
/// loop receives a [`StopToken`], which can only observe it.
#[derive(Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

/// Read-only view of a [`StopSignal`]
#[derive(Debug, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; later calls have no further effect
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn token(&self) -> StopToken {
        StopToken { flag: Arc::clone(&self.flag) }
    }
}

impl StopToken {
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
