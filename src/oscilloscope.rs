//! Audio-side oscilloscope tap (§4.G).
//!
//! Copies a designated unit's output into a ring buffer at tick time and
//! tracks a period estimate as an EWMA of inter-trigger sample counts.
//! Drawing is out of scope; this is the audio-thread-safe data path a GUI
//! would poll from. Grounded on the original engine's `Oscilloscope::sync`
//! and `Oscilloscope::input` (single producer on the audio thread, single
//! consumer on the GUI thread, append-only writes so no lock is needed).

use alloc::vec::Vec;
use ringbuffer::{AllocRingBuffer, RingBuffer};

/// EWMA smoothing factor for the period estimate (`est += 0.9*(observed - est)`).
const PERIOD_SMOOTHING: f64 = 0.9;

pub struct Oscilloscope {
    buffer: AllocRingBuffer<f64>,
    period_estimate: f64,
    samples_since_trigger: usize,
    active: bool,
}

impl Oscilloscope {
    /// `capacity` is the initial display-buffer length in samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: AllocRingBuffer::new(capacity.max(1)),
            period_estimate: capacity.max(1) as f64,
            samples_since_trigger: 0,
            active: false,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.samples_since_trigger = 0;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Called from the audio thread once per tick with the observed unit's
    /// buffer for this block. A no-op while inactive.
    pub fn write(&mut self, samples: &[f64]) {
        if !self.active {
            return;
        }
        for &s in samples {
            self.buffer.push(s);
        }
        self.samples_since_trigger += samples.len();
    }

    /// Called from the audio thread when the trigger source completes a
    /// period. Updates the EWMA period estimate and resets the counter.
    pub fn sync(&mut self) {
        if !self.active {
            return;
        }
        let observed = self.samples_since_trigger as f64;
        self.period_estimate += PERIOD_SMOOTHING * (observed - self.period_estimate);
        self.samples_since_trigger = 0;
    }

    pub fn period_estimate(&self) -> f64 {
        self.period_estimate
    }

    /// Grows or shrinks the display buffer to match a new period estimate.
    /// Only ever called from the GUI/control thread via a command, never
    /// from inside the audio tick.
    pub fn resize(&mut self, capacity: usize) {
        let cap = capacity.max(1);
        let mut resized = AllocRingBuffer::new(cap);
        for v in self.buffer.iter() {
            resized.push(*v);
        }
        self.buffer = resized;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Called from the GUI thread: a plain clone of the current contents.
    /// Safe without a mutex because there is exactly one writer (audio
    /// thread) and writes are append-only pushes.
    pub fn snapshot(&self) -> Vec<f64> {
        self.buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_scope_ignores_writes() {
        let mut scope = Oscilloscope::new(8);
        scope.write(&[1.0, 2.0, 3.0]);
        assert!(scope.snapshot().is_empty());
    }

    #[test]
    fn active_scope_accumulates_samples() {
        let mut scope = Oscilloscope::new(8);
        scope.set_active(true);
        scope.write(&[1.0, 2.0, 3.0]);
        assert_eq!(scope.snapshot(), alloc::vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn ring_buffer_wraps_past_capacity() {
        let mut scope = Oscilloscope::new(4);
        scope.set_active(true);
        scope.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(scope.snapshot(), alloc::vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn period_estimate_tracks_observed_interval_via_ewma() {
        let mut scope = Oscilloscope::new(8);
        scope.set_active(true);
        scope.write(&[0.0; 100]);
        scope.sync();
        assert!((scope.period_estimate() - (8.0 + 0.9 * (100.0 - 8.0))).abs() < 1e-9);
    }

    #[test]
    fn resize_preserves_existing_samples_up_to_new_capacity() {
        let mut scope = Oscilloscope::new(4);
        scope.set_active(true);
        scope.write(&[1.0, 2.0, 3.0, 4.0]);
        scope.resize(8);
        assert_eq!(scope.capacity(), 8);
        assert_eq!(scope.snapshot(), alloc::vec![1.0, 2.0, 3.0, 4.0]);
    }
}
