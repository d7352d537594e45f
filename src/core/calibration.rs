//! Noise-floor calibration.
//!
//! While the device is assumed stationary, a burst of readings is reduced to
//! per-channel mean and standard deviation. The movement threshold for each
//! channel is `mean + k * std`, with a larger multiplier for the
//! accelerometer than for the gyroscope. The mean is signed: a channel that
//! rests at a negative value gets a lower threshold unless the statistics
//! are taken over the rectified basis.

use crate::source::types::{Channel, Reading, CHANNELS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Default multiplier applied to accelerometer standard deviations.
pub const ACCEL_MULTIPLIER: f64 = 6.0;

/// Default multiplier applied to gyroscope standard deviations.
pub const GYRO_MULTIPLIER: f64 = 4.0;

/// Which values the noise statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationBasis {
    /// Signed readings as produced by the sensor
    #[default]
    Raw,
    /// Per-channel absolute values
    Rectified,
}

/// Per-channel movement thresholds for one calibration epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVector([f64; CHANNELS]);

impl ThresholdVector {
    pub fn new(values: [f64; CHANNELS]) -> Self {
        Self(values)
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0[channel.index()]
    }

    pub fn as_array(&self) -> &[f64; CHANNELS] {
        &self.0
    }
}

/// Result of one calibration burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    pub mean: [f64; CHANNELS],
    pub std: [f64; CHANNELS],
    pub threshold: ThresholdVector,
    pub sample_count: usize,
    pub calibrated_at: DateTime<Utc>,
}

/// Calibration errors. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Fewer (or more) readings than the window size.
    Incomplete { expected: usize, actual: usize },
    /// A reading held NaN or an infinity.
    NonFinite { index: usize, channel: Channel },
    /// The sensor kept failing while the burst was being collected.
    SourceFaults { consecutive: usize, last_error: String },
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationError::Incomplete { expected, actual } => write!(
                f,
                "Calibration needs {expected} readings, got {actual}"
            ),
            CalibrationError::NonFinite { index, channel } => write!(
                f,
                "Calibration reading {index} has a non-finite {} value",
                channel.name()
            ),
            CalibrationError::SourceFaults {
                consecutive,
                last_error,
            } => write!(
                f,
                "Calibration aborted after {consecutive} consecutive sensor faults: {last_error}"
            ),
        }
    }
}

impl std::error::Error for CalibrationError {}

/// Derives threshold vectors from stationary bursts.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    window_size: usize,
    accel_multiplier: f64,
    gyro_multiplier: f64,
    basis: CalibrationBasis,
}

impl CalibrationEngine {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            accel_multiplier: ACCEL_MULTIPLIER,
            gyro_multiplier: GYRO_MULTIPLIER,
            basis: CalibrationBasis::Raw,
        }
    }

    pub fn with_multipliers(mut self, accel: f64, gyro: f64) -> Self {
        self.accel_multiplier = accel;
        self.gyro_multiplier = gyro;
        self
    }

    pub fn with_basis(mut self, basis: CalibrationBasis) -> Self {
        self.basis = basis;
        self
    }

    /// Number of readings a calibration burst must contain.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Multiplier for a given channel.
    pub fn multiplier(&self, channel: Channel) -> f64 {
        if channel.is_accel() {
            self.accel_multiplier
        } else {
            self.gyro_multiplier
        }
    }

    /// Compute per-channel statistics and thresholds from a stationary burst.
    ///
    /// A fully static channel (std = 0) gets a threshold equal to its mean.
    pub fn calibrate(&self, readings: &[Reading]) -> Result<Calibration, CalibrationError> {
        if readings.len() != self.window_size || readings.is_empty() {
            return Err(CalibrationError::Incomplete {
                expected: self.window_size,
                actual: readings.len(),
            });
        }

        for (index, reading) in readings.iter().enumerate() {
            if let Some(channel) = Channel::ALL
                .iter()
                .find(|c| !reading.get(**c).is_finite())
            {
                return Err(CalibrationError::NonFinite {
                    index,
                    channel: *channel,
                });
            }
        }

        let basis: Vec<Reading> = match self.basis {
            CalibrationBasis::Raw => readings.to_vec(),
            CalibrationBasis::Rectified => readings.iter().map(Reading::abs).collect(),
        };

        let mut mean = [0.0; CHANNELS];
        let mut std = [0.0; CHANNELS];
        let mut threshold = [0.0; CHANNELS];
        for channel in Channel::ALL {
            let i = channel.index();
            let values: Vec<f64> = basis.iter().map(|r| r.get(channel)).collect();
            mean[i] = values.iter().mean();
            std[i] = values.iter().population_std_dev();
            threshold[i] = mean[i] + self.multiplier(channel) * std[i];
        }

        Ok(Calibration {
            mean,
            std,
            threshold: ThresholdVector::new(threshold),
            sample_count: readings.len(),
            calibrated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_signal_threshold_equals_mean() {
        let engine = CalibrationEngine::new(10);
        let readings = vec![Reading::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0); 10];
        let cal = engine.calibrate(&readings).unwrap();
        assert_eq!(cal.std, [0.0; CHANNELS]);
        assert_eq!(cal.threshold.as_array(), &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_asymmetric_multipliers() {
        let engine = CalibrationEngine::new(4);
        // Each channel alternates +/-1 around zero: mean 0, population std 1.
        let up = Reading::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        let down = Reading::new(-1.0, -1.0, -1.0, -1.0, -1.0, -1.0);
        let cal = engine.calibrate(&[up, down, up, down]).unwrap();
        for channel in Channel::ALL {
            let expected = if channel.is_accel() { 6.0 } else { 4.0 };
            assert!((cal.threshold.get(channel) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rectified_basis() {
        let engine = CalibrationEngine::new(2).with_basis(CalibrationBasis::Rectified);
        let cal = engine
            .calibrate(&[
                Reading::new(-2.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                Reading::new(2.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            ])
            .unwrap();
        assert_eq!(cal.mean[0], 2.0);
        assert_eq!(cal.std[0], 0.0);
    }

    #[test]
    fn test_negative_mean_is_signed() {
        let engine = CalibrationEngine::new(200);
        // az rests at -1.0 with +/-0.01 noise: mean -1.0, population std 0.01.
        let readings: Vec<Reading> = (0..200)
            .map(|i| {
                let az = if i % 2 == 0 { -0.99 } else { -1.01 };
                Reading::new(0.0, 0.0, az, 0.0, 0.0, 0.0)
            })
            .collect();
        let cal = engine.calibrate(&readings).unwrap();

        let mean = cal.mean[Channel::Az.index()];
        let std = cal.std[Channel::Az.index()];
        assert!((mean + 1.0).abs() < 1e-9);
        assert!((std - 0.01).abs() < 1e-9);
        assert_eq!(cal.threshold.get(Channel::Az), mean + 6.0 * std);
        assert!((cal.threshold.get(Channel::Az) + 0.94).abs() < 1e-9);
    }

    #[test]
    fn test_rectified_basis_gives_non_negative_threshold() {
        let engine = CalibrationEngine::new(3).with_basis(CalibrationBasis::Rectified);
        let readings = vec![Reading::new(0.0, 0.0, -1.0, 0.0, 0.0, 0.0); 3];
        let cal = engine.calibrate(&readings).unwrap();
        assert_eq!(cal.threshold.get(Channel::Az), 1.0);
    }

    #[test]
    fn test_incomplete_burst() {
        let engine = CalibrationEngine::new(5);
        let readings = vec![Reading::default(); 3];
        assert_eq!(
            engine.calibrate(&readings).unwrap_err(),
            CalibrationError::Incomplete {
                expected: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn test_nan_is_fatal() {
        let engine = CalibrationEngine::new(3);
        let mut readings = vec![Reading::default(); 3];
        readings[1].gy = f64::NAN;
        assert_eq!(
            engine.calibrate(&readings).unwrap_err(),
            CalibrationError::NonFinite {
                index: 1,
                channel: Channel::Gy
            }
        );
    }
}
