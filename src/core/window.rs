//! Fixed-capacity sliding window of recent readings.
//!
//! The window is shared by calibration (which fills it while the device is
//! still) and movement detection (which keeps it rolling afterwards).

use crate::source::types::{Reading, CHANNELS};
use std::collections::VecDeque;

/// Ring buffer holding the most recent `capacity` readings.
#[derive(Debug, Clone)]
pub struct Window {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl Window {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting the oldest once full.
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Whether the window holds `capacity` readings.
    pub fn is_full(&self) -> bool {
        self.readings.len() == self.capacity
    }

    /// Readings from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Reading> + ExactSizeIterator {
        self.readings.iter()
    }

    /// The newest `n` readings (or all of them if fewer are held), oldest first.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &Reading> {
        self.readings.iter().skip(self.readings.len().saturating_sub(n))
    }

    /// Copy of the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }

    /// Per-channel arithmetic mean. All zeros when empty.
    pub fn mean(&self) -> [f64; CHANNELS] {
        let mut sums = [0.0; CHANNELS];
        if self.readings.is_empty() {
            return sums;
        }
        for reading in &self.readings {
            for (sum, value) in sums.iter_mut().zip(reading.as_array()) {
                *sum += value;
            }
        }
        let n = self.readings.len() as f64;
        sums.map(|s| s / n)
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ax(value: f64) -> Reading {
        Reading::new(value, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = Window::new(3);
        for i in 0..5 {
            window.push(ax(i as f64));
        }
        assert!(window.is_full());
        assert_eq!(window.len(), 3);
        let values: Vec<f64> = window.iter().map(|r| r.ax).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_window_stays_full() {
        let mut window = Window::new(2);
        window.push(ax(1.0));
        assert!(!window.is_full());
        window.push(ax(2.0));
        for _ in 0..10 {
            window.push(ax(3.0));
            assert!(window.is_full());
        }
    }

    #[test]
    fn test_latest() {
        let mut window = Window::new(5);
        for i in 0..5 {
            window.push(ax(i as f64));
        }
        let latest: Vec<f64> = window.latest(2).map(|r| r.ax).collect();
        assert_eq!(latest, vec![3.0, 4.0]);
        assert_eq!(window.latest(10).count(), 5);
    }

    #[test]
    fn test_mean() {
        let mut window = Window::new(4);
        window.push(ax(1.0));
        window.push(ax(3.0));
        assert_eq!(window.mean()[0], 2.0);
        assert_eq!(Window::new(4).mean(), [0.0; CHANNELS]);
    }
}
