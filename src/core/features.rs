//! Feature extraction from fixed-length segments.
//!
//! Each of the six channels contributes three values, laid out as
//! `[mean x6, variance x6, fft magnitude x6]`:
//!
//! - mean
//! - population variance
//! - magnitude of bin 0 of the full complex FFT along time
//!
//! Bin 0 is the DC bin (`|n * mean|`), not the first harmonic. Externally
//! trained models expect exactly this layout.

use crate::source::types::{Channel, Reading, CHANNELS};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Statistics per channel.
pub const STATS_PER_CHANNEL: usize = 3;

/// Length of every feature vector.
pub const FEATURE_LEN: usize = CHANNELS * STATS_PER_CHANNEL;

/// Fixed-size feature vector consumed by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(#[serde(with = "feature_array")] [f64; FEATURE_LEN]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_LEN]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn mean(&self, channel: Channel) -> f64 {
        self.0[channel.index()]
    }

    pub fn variance(&self, channel: Channel) -> f64 {
        self.0[CHANNELS + channel.index()]
    }

    pub fn fft_magnitude(&self, channel: Channel) -> f64 {
        self.0[2 * CHANNELS + channel.index()]
    }

    /// Column names in vector order, e.g. `mean_ax`, `var_gz`, `fft0_ay`.
    pub fn column_names() -> Vec<String> {
        let mut names = Vec::with_capacity(FEATURE_LEN);
        for prefix in ["mean", "var", "fft0"] {
            for channel in Channel::ALL {
                names.push(format!("{prefix}_{}", channel.name()));
            }
        }
        names
    }
}

/// Feature extraction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    EmptySegment,
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::EmptySegment => write!(f, "Cannot extract features from an empty segment"),
        }
    }
}

impl std::error::Error for FeatureError {}

/// Reduces a segment to a [`FeatureVector`], reusing FFT plans across calls.
pub struct FeatureExtractor {
    planner: FftPlanner<f64>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    pub fn extract(&mut self, segment: &[Reading]) -> Result<FeatureVector, FeatureError> {
        if segment.is_empty() {
            return Err(FeatureError::EmptySegment);
        }

        let fft = self.planner.plan_fft_forward(segment.len());
        let mut values = [0.0; FEATURE_LEN];

        for channel in Channel::ALL {
            let series: Vec<f64> = segment.iter().map(|r| r.get(channel)).collect();
            let i = channel.index();

            values[i] = series.iter().mean();
            values[CHANNELS + i] = series.iter().population_variance();

            let mut buffer: Vec<Complex<f64>> =
                series.iter().map(|&x| Complex::new(x, 0.0)).collect();
            fft.process(&mut buffer);
            values[2 * CHANNELS + i] = buffer[0].norm();
        }

        Ok(FeatureVector(values))
    }
}

/// Convenience wrapper using a throwaway extractor.
pub fn compute_features(segment: &[Reading]) -> Result<FeatureVector, FeatureError> {
    FeatureExtractor::new().extract(segment)
}

/// Serde support for the fixed-size array (serialized as a plain list).
mod feature_array {
    use super::FEATURE_LEN;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(values: &[f64; FEATURE_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        values.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[f64; FEATURE_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let len = values.len();
        values
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected {FEATURE_LEN} features, got {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_layout() {
        let segment: Vec<Reading> = (0..4)
            .map(|i| Reading::new(i as f64, 2.0, 0.0, 0.0, 0.0, -1.0))
            .collect();
        let features = compute_features(&segment).unwrap();

        assert_eq!(features.len(), FEATURE_LEN);
        // ax = 0,1,2,3
        assert!((features.mean(Channel::Ax) - 1.5).abs() < 1e-12);
        assert!((features.variance(Channel::Ax) - 1.25).abs() < 1e-12);
        assert!((features.fft_magnitude(Channel::Ax) - 6.0).abs() < 1e-9);
        // constant ay = 2
        assert_eq!(features.variance(Channel::Ay), 0.0);
        assert!((features.fft_magnitude(Channel::Ay) - 8.0).abs() < 1e-9);
        // DC magnitude is unsigned
        assert!((features.fft_magnitude(Channel::Gz) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_dc_bin_equals_n_times_mean() {
        let segment: Vec<Reading> = (0..100)
            .map(|i| {
                let t = i as f64 / 10.0;
                Reading::new(t.sin(), t.cos(), 1.0 + 0.01 * t, 0.0, 5.0 * t.sin(), 0.0)
            })
            .collect();
        let features = compute_features(&segment).unwrap();
        for channel in Channel::ALL {
            let expected = (100.0 * features.mean(channel)).abs();
            assert!((features.fft_magnitude(channel) - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn test_length_independent_of_input() {
        let mut extractor = FeatureExtractor::new();
        for len in [1usize, 3, 64, 100, 257] {
            let segment = vec![Reading::new(0.1, 0.2, 0.3, 0.4, 0.5, 0.6); len];
            assert_eq!(extractor.extract(&segment).unwrap().as_slice().len(), 18);
        }
    }

    #[test]
    fn test_empty_segment() {
        assert_eq!(compute_features(&[]), Err(FeatureError::EmptySegment));
    }

    #[test]
    fn test_column_names() {
        let names = FeatureVector::column_names();
        assert_eq!(names.len(), FEATURE_LEN);
        assert_eq!(names[0], "mean_ax");
        assert_eq!(names[6], "var_ax");
        assert_eq!(names[17], "fft0_gz");
    }

    #[test]
    fn test_serde_roundtrip_rejects_wrong_length() {
        let json = serde_json::to_string(&FeatureVector::new([1.0; FEATURE_LEN])).unwrap();
        assert!(json.starts_with('['));
        assert!(serde_json::from_str::<FeatureVector>("[1.0, 2.0]").is_err());
    }
}
