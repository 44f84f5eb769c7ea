//! Rolling-average input smoothing.
//!
//! Digital devices report analog axes that jump between -1, 0 and 1.
//! Blend trees want a continuously varying value instead, so units feed raw
//! samples through a fixed-size window and publish its average.

use bevy::prelude::*;

use crate::animator::BlendParameters;

/// Fixed-capacity ring buffer of scalar samples with a running average.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct SmoothedSignal {
    samples: Vec<f32>,
    next: usize,
    len: usize,
    sum: f32,
}

impl Default for SmoothedSignal {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl SmoothedSignal {
    /// Window size used by [`Default`].
    pub const DEFAULT_CAPACITY: usize = 10;

    /// Create an empty signal holding up to `capacity` samples.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            next: 0,
            len: 0,
            sum: 0.0,
        }
    }

    /// Maximum number of samples in the window.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no sample has been added since creation or the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push a sample, evicting the oldest one once the window is full.
    pub fn add(&mut self, sample: f32) {
        if self.len == self.capacity() {
            self.sum -= self.samples[self.next];
        } else {
            self.len += 1;
        }

        self.samples[self.next] = sample;
        self.sum += sample;
        self.next = (self.next + 1) % self.capacity();

        // Re-sum once per wrap so rounding error never accumulates.
        if self.next == 0 {
            self.sum = self.samples[..self.len].iter().sum();
        }
    }

    /// Mean of the samples currently in the window, zero when empty.
    #[inline]
    pub fn average(&self) -> f32 {
        if self.len == 0 {
            0.0
        } else {
            self.sum / self.len as f32
        }
    }

    /// Most recently added sample.
    pub fn latest(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let index = (self.next + self.capacity() - 1) % self.capacity();
        Some(self.samples[index])
    }

    /// Change the window size. History is discarded.
    pub fn resize(&mut self, capacity: usize) {
        *self = Self::new(capacity);
    }

    /// Discard all samples, keeping the capacity.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.next = 0;
        self.len = 0;
        self.sum = 0.0;
    }
}

/// Smoothed movement input: lateral, forward and magnitude channels.
#[derive(Reflect, Debug, Clone, PartialEq, Default)]
pub struct SmoothedInput {
    /// Lateral input channel.
    pub x: SmoothedSignal,
    /// Forward input channel.
    pub y: SmoothedSignal,
    /// Input magnitude channel.
    pub magnitude: SmoothedSignal,
}

impl SmoothedInput {
    /// Create smoothing channels sharing one window size.
    pub fn new(capacity: usize) -> Self {
        Self {
            x: SmoothedSignal::new(capacity),
            y: SmoothedSignal::new(capacity),
            magnitude: SmoothedSignal::new(capacity),
        }
    }

    /// Push one frame of raw movement input.
    pub fn add(&mut self, movement: Vec2) {
        self.x.add(movement.x);
        self.y.add(movement.y);
        self.magnitude.add(movement.length().min(1.0));
    }

    /// Seed every channel with a snapshot taken from another unit.
    pub fn seed(&mut self, snapshot: InputSnapshot) {
        self.x.add(snapshot.x);
        self.y.add(snapshot.y);
        self.magnitude.add(snapshot.magnitude);
    }

    /// Current averages as a snapshot.
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            x: self.x.average(),
            y: self.y.average(),
            magnitude: self.magnitude.average(),
        }
    }

    /// Current averages as animator blend parameters.
    pub fn blend_parameters(&self) -> BlendParameters {
        let snapshot = self.snapshot();
        BlendParameters {
            input_x: snapshot.x,
            input_y: snapshot.y,
            magnitude: snapshot.magnitude,
        }
    }

    /// Change the window size of every channel. History is discarded.
    pub fn resize(&mut self, capacity: usize) {
        self.x.resize(capacity);
        self.y.resize(capacity);
        self.magnitude.resize(capacity);
    }

    /// Discard history on every channel.
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.magnitude.clear();
    }
}

/// Blended input values carried across a unit transition.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSnapshot {
    /// Averaged lateral input.
    pub x: f32,
    /// Averaged forward input.
    pub y: f32,
    /// Averaged magnitude.
    pub magnitude: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signal_averages_to_zero() {
        let signal = SmoothedSignal::new(4);
        assert!(signal.is_empty());
        assert_eq!(signal.average(), 0.0);
        assert_eq!(signal.latest(), None);
    }

    #[test]
    fn partial_window_averages_added_samples() {
        let mut signal = SmoothedSignal::new(5);
        signal.add(1.0);
        signal.add(2.0);
        signal.add(3.0);

        assert_eq!(signal.len(), 3);
        assert_eq!(signal.average(), 2.0);
        assert_eq!(signal.latest(), Some(3.0));
    }

    #[test]
    fn full_window_evicts_the_oldest_sample() {
        let mut signal = SmoothedSignal::new(3);
        for sample in [1.0, 2.0, 3.0, 4.0] {
            signal.add(sample);
        }

        assert_eq!(signal.len(), 3);
        assert_eq!(signal.average(), 3.0);
        assert_eq!(signal.latest(), Some(4.0));
    }

    #[test]
    fn long_runs_track_the_window_exactly() {
        let mut signal = SmoothedSignal::new(4);
        for i in 0..1000 {
            signal.add((i % 7) as f32 * 0.1);
        }
        let expected: f32 = [996, 997, 998, 999]
            .iter()
            .map(|i| (i % 7) as f32 * 0.1)
            .sum::<f32>()
            / 4.0;
        assert!((signal.average() - expected).abs() < 1e-5);
    }

    #[test]
    fn resize_discards_history() {
        let mut signal = SmoothedSignal::new(3);
        signal.add(1.0);
        signal.add(1.0);

        signal.resize(6);
        assert_eq!(signal.capacity(), 6);
        assert!(signal.is_empty());
        assert_eq!(signal.average(), 0.0);

        signal.add(0.5);
        assert_eq!(signal.average(), 0.5);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut signal = SmoothedSignal::new(0);
        assert_eq!(signal.capacity(), 1);
        signal.add(2.0);
        signal.add(4.0);
        assert_eq!(signal.average(), 4.0);
    }

    #[test]
    fn digital_input_becomes_a_ramp() {
        let mut input = SmoothedInput::new(4);
        for _ in 0..4 {
            input.add(Vec2::ZERO);
        }

        let mut ramp = Vec::new();
        for _ in 0..4 {
            input.add(Vec2::new(0.0, 1.0));
            ramp.push(input.magnitude.average());
        }
        assert_eq!(ramp, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(input.snapshot().y, 1.0);
    }

    #[test]
    fn seed_carries_a_snapshot_over() {
        let mut input = SmoothedInput::new(4);
        input.seed(InputSnapshot {
            x: 0.0,
            y: 0.8,
            magnitude: 0.8,
        });
        assert_eq!(input.blend_parameters().magnitude, 0.8);
    }
}
