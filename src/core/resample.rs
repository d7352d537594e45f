//! Variable-length to fixed-length resampling.
//!
//! Two policies exist. A trained model must be fed segments resampled the
//! way its training data was:
//!
//! - [`ResampleMode::Training`] subsamples evenly spaced indices when the
//!   segment is longer than the target and interpolates when it is shorter.
//! - [`ResampleMode::Live`] always interpolates.
//!
//! Both return the segment unchanged when it already has the target length.

use crate::source::types::{Reading, CHANNELS};
use serde::{Deserialize, Serialize};

/// Default fixed segment length fed to feature extraction.
pub const TARGET_SIZE: usize = 100;

/// Which call site's resampling policy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    Training,
    Live,
}

/// Resampling errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResampleError {
    EmptySegment,
    ZeroTarget,
    /// Interpolation needs at least two points.
    TooShort { len: usize },
}

impl std::fmt::Display for ResampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResampleError::EmptySegment => write!(f, "Cannot resample an empty segment"),
            ResampleError::ZeroTarget => write!(f, "Resample target size must be positive"),
            ResampleError::TooShort { len } => {
                write!(f, "Cannot interpolate a segment of {len} reading(s)")
            }
        }
    }
}

impl std::error::Error for ResampleError {}

/// Resample `segment` to exactly `target_size` readings.
pub fn resample(
    segment: &[Reading],
    target_size: usize,
    mode: ResampleMode,
) -> Result<Vec<Reading>, ResampleError> {
    if segment.is_empty() {
        return Err(ResampleError::EmptySegment);
    }
    if target_size == 0 {
        return Err(ResampleError::ZeroTarget);
    }
    if segment.len() == target_size {
        return Ok(segment.to_vec());
    }

    match mode {
        ResampleMode::Training if segment.len() > target_size => Ok(subsample_indices(
            segment.len(),
            target_size,
        )
        .into_iter()
        .map(|i| segment[i])
        .collect()),
        _ => interpolate(segment, target_size),
    }
}

/// `target_size` indices evenly spaced over `[0, len - 1]`, truncated toward zero.
pub fn subsample_indices(len: usize, target_size: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    linspace(0.0, (len - 1) as f64, target_size)
        .into_iter()
        .map(|x| (x as usize).min(len - 1))
        .collect()
}

/// Per-channel linear interpolation over normalized positions.
///
/// Source samples sit at `linspace(0, 1, len)`, targets at
/// `linspace(0, 1, target_size)`. A target outside the source support is
/// extrapolated from the nearest edge interval.
pub fn interpolate(segment: &[Reading], target_size: usize) -> Result<Vec<Reading>, ResampleError> {
    if segment.len() < 2 {
        return Err(ResampleError::TooShort { len: segment.len() });
    }
    if target_size == 0 {
        return Err(ResampleError::ZeroTarget);
    }

    let x = linspace(0.0, 1.0, segment.len());
    let columns: Vec<[f64; CHANNELS]> = segment.iter().map(Reading::as_array).collect();

    let resampled = linspace(0.0, 1.0, target_size)
        .into_iter()
        .map(|x_new| {
            // First index with x >= x_new, kept inside [1, len - 1].
            let hi = x.partition_point(|&xi| xi < x_new).clamp(1, x.len() - 1);
            let lo = hi - 1;
            let span = x[hi] - x[lo];
            let mut values = [0.0; CHANNELS];
            for (c, value) in values.iter_mut().enumerate() {
                let (y_lo, y_hi) = (columns[lo][c], columns[hi][c]);
                let slope = (y_hi - y_lo) / span;
                *value = slope * (x_new - x[lo]) + y_lo;
            }
            Reading::from_array(values)
        })
        .collect();

    Ok(resampled)
}

/// `num` evenly spaced values from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| i as f64 * step + start).collect();
            values[num - 1] = stop;
            values
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<Reading> {
        (0..len)
            .map(|i| {
                let v = i as f64;
                Reading::new(v, 2.0 * v, -v, 10.0 + v, 0.5 * v, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_same_length_is_identity() {
        let segment = ramp(37);
        for mode in [ResampleMode::Training, ResampleMode::Live] {
            assert_eq!(resample(&segment, 37, mode).unwrap(), segment);
        }
    }

    #[test]
    fn test_training_subsamples_literal_indices() {
        let segment = ramp(300);
        let out = resample(&segment, 100, ResampleMode::Training).unwrap();
        assert_eq!(out.len(), 100);

        let step = 299.0 / 99.0;
        for (i, reading) in out.iter().enumerate().take(99) {
            let expected = (i as f64 * step) as usize;
            assert_eq!(*reading, segment[expected]);
        }
        assert_eq!(out[0], segment[0]);
        assert_eq!(out[1], segment[3]);
        assert_eq!(out[50], segment[151]);
        assert_eq!(out[99], segment[299]);
    }

    #[test]
    fn test_live_interpolates_when_longer() {
        let segment = ramp(300);
        let out = resample(&segment, 100, ResampleMode::Live).unwrap();
        assert_eq!(out.len(), 100);
        // Position 1/99 of a 0..299 ramp is 3.0202..., not an original sample.
        assert!((out[1].ax - 299.0 / 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_training_interpolates_when_shorter() {
        let segment = ramp(10);
        let out = resample(&segment, 100, ResampleMode::Training).unwrap();
        assert_eq!(out.len(), 100);
        assert!((out[99].ax - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolated_ramp_keeps_endpoints_and_order() {
        for (len, target) in [(3usize, 100usize), (55, 100), (250, 100), (7, 8)] {
            let segment = ramp(len);
            let out = interpolate(&segment, target).unwrap();
            assert_eq!(out.len(), target);
            assert!((out[0].ax - 0.0).abs() < 1e-9);
            assert!((out[target - 1].ax - (len - 1) as f64).abs() < 1e-9);
            assert!((out[target - 1].gx - (10.0 + (len - 1) as f64)).abs() < 1e-9);
            for pair in out.windows(2) {
                assert!(pair[1].ax >= pair[0].ax);
                assert!(pair[1].az <= pair[0].az);
            }
        }
    }

    #[test]
    fn test_constant_channel_stays_constant() {
        let out = interpolate(&ramp(13), 40).unwrap();
        assert!(out.iter().all(|r| (r.gz - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            resample(&[], 10, ResampleMode::Live),
            Err(ResampleError::EmptySegment)
        );
        assert_eq!(
            resample(&ramp(5), 0, ResampleMode::Training),
            Err(ResampleError::ZeroTarget)
        );
        assert_eq!(
            resample(&ramp(1), 10, ResampleMode::Live),
            Err(ResampleError::TooShort { len: 1 })
        );
    }

    #[test]
    fn test_subsample_indices_bounds() {
        let indices = subsample_indices(1000, 10);
        assert_eq!(indices.len(), 10);
        assert_eq!(indices[0], 0);
        assert_eq!(indices[9], 999);
        assert!(indices.windows(2).all(|p| p[1] >= p[0]));
    }
}
