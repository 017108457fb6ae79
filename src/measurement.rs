//! Moving average smoother for sensor readings.
//!
//! The window decays even when an acquisition cycle yields no fresh sample:
//! the controller calls [`MovingAverage::remove_oldest`] on a miss so the
//! average forgets old data at the same rate it would have with fresh input.

use heapless::Vec;

/// Hard cap on the retained sample window, independent of the configured size.
pub const MAX_WINDOW: usize = 32;

/// Bounded-window arithmetic mean over a chronological sample sequence.
///
/// Samples are kept oldest-first. The window bound is enforced at insert
/// time, so shrinking the window does not truncate already-held data until
/// the next [`add`](MovingAverage::add).
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: Vec<f32, MAX_WINDOW>,
    max_samples: usize,
}

impl MovingAverage {
    /// Create a smoother retaining up to `max_samples` readings.
    ///
    /// Sizes above [`MAX_WINDOW`] are capped there.
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::new(),
            max_samples: max_samples.clamp(1, MAX_WINDOW),
        }
    }

    /// Change the maximum retained sample count.
    ///
    /// Existing content beyond the new bound stays until the next insert.
    pub fn set_window(&mut self, max_samples: usize) {
        self.max_samples = max_samples.clamp(1, MAX_WINDOW);
    }

    /// Append a sample, evicting oldest entries while the window overflows.
    pub fn add(&mut self, sample: f32) {
        if self.samples.is_full() {
            self.samples.remove(0);
        }
        // Infallible after the eviction above.
        let _ = self.samples.push(sample);
        while self.samples.len() > self.max_samples {
            self.samples.remove(0);
        }
    }

    /// Evict the oldest sample without adding a new one.
    ///
    /// No-op on an empty window. Called when an acquisition cycle failed.
    pub fn remove_oldest(&mut self) {
        if !self.samples.is_empty() {
            self.samples.remove(0);
        }
    }

    /// Average of the `latest_count` most recent samples.
    ///
    /// `latest_count == 0` averages the whole window. Returns `0.0` when the
    /// window is empty; callers that need to distinguish "no data" from a
    /// computed zero must check [`is_empty`](MovingAverage::is_empty) first.
    pub fn average(&self, latest_count: usize) -> f32 {
        let count = if latest_count == 0 {
            self.samples.len()
        } else {
            latest_count.min(self.samples.len())
        };
        if count == 0 {
            return 0.0;
        }
        let sum: f32 = self.samples[self.samples.len() - count..].iter().sum();
        sum / count as f32
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples are held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(4)
    }
}
