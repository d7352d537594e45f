//! Adaptive-threshold movement detection with a consecutive-count debounce.

use crate::core::calibration::ThresholdVector;
use crate::core::window::Window;
use crate::source::types::{Channel, CHANNELS};

/// Default number of consecutive above-threshold readings required.
pub const MIN_CONSECUTIVE: usize = 5;

/// Per-tick detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Detection {
    /// Whether any channel sustained its deviation
    pub moving: bool,
    /// Above-threshold count per channel over the debounce span
    pub counts: [usize; CHANNELS],
}

impl Detection {
    /// First channel that triggered, if any.
    pub fn triggered_by(&self, min_consecutive: usize) -> Option<Channel> {
        Channel::ALL
            .into_iter()
            .find(|c| self.counts[c.index()] >= min_consecutive)
    }
}

/// Flags movement when one channel deviates from the window mean by more
/// than its threshold on each of the last `min_consecutive` readings.
#[derive(Debug, Clone)]
pub struct MovementDetector {
    min_consecutive: usize,
}

impl Default for MovementDetector {
    fn default() -> Self {
        Self::new(MIN_CONSECUTIVE)
    }
}

impl MovementDetector {
    /// A debounce of zero is treated as one.
    pub fn new(min_consecutive: usize) -> Self {
        Self {
            min_consecutive: min_consecutive.max(1),
        }
    }

    pub fn min_consecutive(&self) -> usize {
        self.min_consecutive
    }

    /// Evaluate the window. Never reports movement before the window is full.
    pub fn evaluate(&self, window: &Window, threshold: &ThresholdVector) -> Detection {
        if !window.is_full() {
            return Detection::default();
        }

        let mean = window.mean();
        let limits = threshold.as_array();
        let mut counts = [0usize; CHANNELS];
        for reading in window.latest(self.min_consecutive) {
            for (i, value) in reading.as_array().iter().enumerate() {
                if (value - mean[i]).abs() > limits[i] {
                    counts[i] += 1;
                }
            }
        }

        let moving = counts.iter().any(|&n| n >= self.min_consecutive);
        Detection { moving, counts }
    }

    pub fn is_moving(&self, window: &Window, threshold: &ThresholdVector) -> bool {
        self.evaluate(window, threshold).moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::Reading;

    fn window_of(values: &[f64], capacity: usize) -> Window {
        let mut window = Window::new(capacity);
        for v in values {
            window.push(Reading::new(*v, 0.0, 1.0, 0.0, 0.0, 0.0));
        }
        window
    }

    fn threshold(ax: f64) -> ThresholdVector {
        ThresholdVector::new([ax, 0.0, 1.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_not_full_never_moving() {
        let window = window_of(&[5.0, 5.0, 5.0], 10);
        assert!(!MovementDetector::new(3).is_moving(&window, &threshold(0.1)));
    }

    #[test]
    fn test_identical_readings_never_move() {
        let window = window_of(&[0.3; 20], 20);
        let threshold = ThresholdVector::new([0.3, 0.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(!MovementDetector::new(5).is_moving(&window, &threshold));
    }

    #[test]
    fn test_requires_consecutive_readings() {
        let mut values = vec![0.0; 16];
        values.extend([1.0, 1.0, 1.0, 1.0]);
        let window = window_of(&values, 20);
        let detector = MovementDetector::new(5);
        let detection = detector.evaluate(&window, &threshold(0.5));
        assert!(!detection.moving);
        assert_eq!(detection.counts[0], 4);

        let mut window = window;
        window.push(Reading::new(1.0, 0.0, 1.0, 0.0, 0.0, 0.0));
        let detection = detector.evaluate(&window, &threshold(0.5));
        assert!(detection.moving);
        assert_eq!(detection.triggered_by(5), Some(Channel::Ax));
    }

    #[test]
    fn test_single_spike_suppressed() {
        let mut values = vec![0.0; 19];
        values.push(10.0);
        let window = window_of(&values, 20);
        assert!(!MovementDetector::new(5).is_moving(&window, &threshold(0.5)));
    }

    #[test]
    fn test_any_channel_triggers() {
        let mut window = Window::new(10);
        for i in 0..10 {
            let gz = if i >= 5 { 50.0 } else { 0.0 };
            window.push(Reading::new(0.0, 0.0, 1.0, 0.0, 0.0, gz));
        }
        let threshold = ThresholdVector::new([0.1, 0.1, 1.1, 1.0, 1.0, 1.0]);
        let detection = MovementDetector::new(5).evaluate(&window, &threshold);
        assert!(detection.moving);
        assert_eq!(detection.triggered_by(5), Some(Channel::Gz));
    }

    #[test]
    fn test_zero_debounce_is_one() {
        assert_eq!(MovementDetector::new(0).min_consecutive(), 1);
    }
}
