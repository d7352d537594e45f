//! Per-tick detection pipeline and the classification stage behind it.
//!
//! [`Pipeline`] owns the window, thresholds and segment collector and is
//! driven one reading at a time. It depends only on the readings and their
//! timestamps, never on wall-clock time. [`SegmentClassifier`] turns a
//! finalized segment into a label and a publishable [`DoorEvent`].

use crate::config::Config;
use crate::core::calibration::{Calibration, CalibrationEngine, CalibrationError};
use crate::core::detector::{Detection, MovementDetector};
use crate::core::features::{FeatureError, FeatureExtractor, FeatureVector};
use crate::core::resample::{resample, ResampleError, ResampleMode};
use crate::core::segment::{FinalizedSegment, SegmentCollector, SegmentOutcome};
use crate::core::window::Window;
use crate::core::Label;
use crate::inference::{InferenceContext, InferenceError};
use crate::publish::DoorEvent;
use crate::source::types::{Reading, TimedReading};
use chrono_tz::Tz;

/// Pipeline errors.
#[derive(Debug)]
pub enum PipelineError {
    /// A tick arrived before the first calibration
    NotCalibrated,
    /// Re-calibration was requested while a segment is open
    SegmentOpen { len: usize },
    Calibration(CalibrationError),
    Resample(ResampleError),
    Feature(FeatureError),
    Inference(InferenceError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::NotCalibrated => write!(f, "Pipeline is not calibrated"),
            PipelineError::SegmentOpen { len } => write!(
                f,
                "Cannot recalibrate while a segment is open ({len} readings)"
            ),
            PipelineError::Calibration(e) => write!(f, "Calibration failed: {e}"),
            PipelineError::Resample(e) => write!(f, "Resample failed: {e}"),
            PipelineError::Feature(e) => write!(f, "Feature extraction failed: {e}"),
            PipelineError::Inference(e) => write!(f, "Inference failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<CalibrationError> for PipelineError {
    fn from(e: CalibrationError) -> Self {
        PipelineError::Calibration(e)
    }
}

impl From<ResampleError> for PipelineError {
    fn from(e: ResampleError) -> Self {
        PipelineError::Resample(e)
    }
}

impl From<FeatureError> for PipelineError {
    fn from(e: FeatureError) -> Self {
        PipelineError::Feature(e)
    }
}

impl From<InferenceError> for PipelineError {
    fn from(e: InferenceError) -> Self {
        PipelineError::Inference(e)
    }
}

/// Result of feeding one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub detection: Detection,
    pub segment: SegmentOutcome,
}

impl TickOutcome {
    pub fn is_moving(&self) -> bool {
        self.detection.moving
    }
}

/// Window, thresholds and segment state for one sensor stream.
pub struct Pipeline {
    engine: CalibrationEngine,
    detector: MovementDetector,
    collector: SegmentCollector,
    window: Window,
    calibration: Option<Calibration>,
}

impl Pipeline {
    pub fn new(
        engine: CalibrationEngine,
        detector: MovementDetector,
        collector: SegmentCollector,
    ) -> Self {
        let window = Window::new(engine.window_size());
        Self {
            engine,
            detector,
            collector,
            window,
            calibration: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let engine = CalibrationEngine::new(config.calibration.window_size)
            .with_multipliers(
                config.calibration.accel_multiplier,
                config.calibration.gyro_multiplier,
            )
            .with_basis(config.calibration.basis);
        Self::new(
            engine,
            MovementDetector::new(config.detection.min_consecutive),
            SegmentCollector::new(config.segmentation.to_segment_config()),
        )
    }

    /// Readings a calibration burst must contain.
    pub fn window_size(&self) -> usize {
        self.engine.window_size()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn is_collecting(&self) -> bool {
        self.collector.is_collecting()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Set thresholds from a stationary burst. The burst also becomes the
    /// detection window.
    pub fn calibrate(&mut self, readings: &[Reading]) -> Result<&Calibration, PipelineError> {
        let calibration = self.engine.calibrate(readings)?;

        tracing::info!(samples = calibration.sample_count, "Calibration complete");
        tracing::debug!(
            mean = ?calibration.mean,
            std = ?calibration.std,
            threshold = ?calibration.threshold.as_array(),
            "Calibration statistics"
        );

        self.window.clear();
        for reading in readings {
            self.window.push(*reading);
        }
        Ok(self.calibration.insert(calibration))
    }

    /// Replace the thresholds. Refused while a segment is open.
    pub fn recalibrate(&mut self, readings: &[Reading]) -> Result<&Calibration, PipelineError> {
        if self.collector.is_collecting() {
            return Err(PipelineError::SegmentOpen {
                len: self.collector.open_len(),
            });
        }
        self.calibrate(readings)
    }

    /// Feed one reading through detection and segmentation.
    pub fn tick(&mut self, sample: TimedReading) -> Result<TickOutcome, PipelineError> {
        let Some(calibration) = self.calibration.as_ref() else {
            return Err(PipelineError::NotCalibrated);
        };

        self.window.push(sample.reading);
        let detection = self.detector.evaluate(&self.window, &calibration.threshold);
        let segment = self.collector.observe(sample, detection.moving);

        match &segment {
            SegmentOutcome::Started => {
                tracing::info!(
                    channel = ?detection.triggered_by(self.detector.min_consecutive()),
                    "Movement started"
                );
            }
            SegmentOutcome::Finalized(seg) => {
                tracing::info!(
                    len = seg.len(),
                    duration_ms = seg.duration().num_milliseconds(),
                    reason = ?seg.reason,
                    "Segment finalized"
                );
            }
            SegmentOutcome::Discarded { len } => {
                tracing::debug!(len, "Discarded short segment");
            }
            SegmentOutcome::Idle | SegmentOutcome::Collecting => {}
        }

        Ok(TickOutcome { detection, segment })
    }

    /// Drop the open segment, if any. Returns its length.
    pub fn abandon(&mut self) -> Option<usize> {
        let len = self.collector.abandon();
        if let Some(len) = len {
            tracing::info!(len, "Dropped open segment at shutdown");
        }
        len
    }
}

/// Resample a segment and extract its feature vector.
pub fn segment_features(
    extractor: &mut FeatureExtractor,
    segment: &[Reading],
    target_size: usize,
    mode: ResampleMode,
) -> Result<FeatureVector, PipelineError> {
    let fixed = resample(segment, target_size, mode)?;
    Ok(extractor.extract(&fixed)?)
}

/// Live classification of finalized segments.
pub struct SegmentClassifier {
    inference: InferenceContext,
    extractor: FeatureExtractor,
    target_size: usize,
    timezone: Tz,
}

impl SegmentClassifier {
    pub fn new(inference: InferenceContext, target_size: usize, timezone: Tz) -> Self {
        Self {
            inference,
            extractor: FeatureExtractor::new(),
            target_size,
            timezone,
        }
    }

    pub fn classify(&mut self, segment: &FinalizedSegment) -> Result<Label, PipelineError> {
        let features = segment_features(
            &mut self.extractor,
            &segment.samples(),
            self.target_size,
            ResampleMode::Live,
        )?;
        Ok(self.inference.classify(&features)?)
    }

    /// Event stamped with the segment's end time.
    pub fn event_for(&self, label: Label, segment: &FinalizedSegment) -> Option<DoorEvent> {
        DoorEvent::new(label, segment.ended_at, self.timezone)
    }
}
