//! # Sample Window Module
//!
//! Fixed-capacity rolling window of the most recent samples.
//!
//! The acquisition thread is the only writer; any number of consumers
//! take snapshots. Every push is applied under the lock, so a snapshot
//! always sees a whole number of pushes and never a half-evicted window.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::frame::protocol::Sample;

/// Default window capacity (samples)
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// Bounded, oldest-first sample window with FIFO eviction
#[derive(Debug)]
pub struct SampleWindow {
    capacity: usize,
    samples: Mutex<VecDeque<Sample>>,
}

/// Aggregate view of one consistent snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub count: usize,
    pub last: Sample,
    pub min: Sample,
    pub max: Sample,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` samples
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample window capacity must be non-zero");

        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a sample, evicting the oldest ones beyond capacity
    pub fn push(&self, sample: Sample) {
        let mut samples = self.samples.lock();
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Ordered copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        let samples = self.samples.lock();
        samples.iter().copied().collect()
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<Sample> {
        self.samples.lock().back().copied()
    }

    /// Count, last, min and max over a single snapshot
    ///
    /// NaN samples are skipped for min/max but still count.
    pub fn summary(&self) -> Option<WindowSummary> {
        let snapshot = self.snapshot();
        let last = *snapshot.last()?;

        let (min, max) = snapshot
            .iter()
            .copied()
            .fold((f64::NAN, f64::NAN), |(min, max), s| (min.min(s), max.max(s)));

        Some(WindowSummary {
            count: snapshot.len(),
            last,
            min,
            max,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
