//! Core online pipeline for the DoorSense agent.
//!
//! This module contains:
//! - The sliding reading window
//! - Noise-floor calibration and movement detection
//! - Segment collection with cool-down
//! - Resampling and feature extraction

pub mod calibration;
pub mod detector;
pub mod features;
pub mod label;
pub mod resample;
pub mod segment;
pub mod window;

// Re-export commonly used types
pub use calibration::{
    Calibration, CalibrationBasis, CalibrationEngine, CalibrationError, ThresholdVector,
};
pub use detector::{Detection, MovementDetector};
pub use features::{compute_features, FeatureError, FeatureExtractor, FeatureVector, FEATURE_LEN};
pub use label::Label;
pub use resample::{resample, ResampleError, ResampleMode};
pub use segment::{
    CollectorState, CoolDownAnchor, FinalizeReason, FinalizedSegment, SegmentCollector,
    SegmentConfig, SegmentOutcome,
};
pub use window::Window;
