//! Training data files.
//!
//! Collection mode appends labeled readings to a flat CSV
//! (`ax,ay,az,gx,gy,gz,timestamp,label`). For training, that file is cut back
//! into segments, resampled with the training policy and reduced to feature
//! vectors, which are exported for the external model fitting step.

use crate::core::features::{FeatureError, FeatureExtractor, FeatureVector};
use crate::core::resample::{resample, ResampleError, ResampleMode};
use crate::core::{FinalizedSegment, Label};
use crate::source::types::Reading;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timestamp gap (seconds) that separates two training segments.
pub const SEGMENT_GAP_SECS: f64 = 0.5;

/// Training segments with this many rows or fewer are dropped.
pub const MAX_DISCARDED_ROWS: usize = 2;

/// One raw sample in the training file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub label: u8,
}

impl TrainingRow {
    pub fn reading(&self) -> Reading {
        Reading::new(self.ax, self.ay, self.az, self.gx, self.gy, self.gz)
    }
}

/// A run of rows sharing one label with no large time gap.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSegment {
    pub label: Label,
    pub rows: Vec<TrainingRow>,
}

impl TrainingSegment {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn samples(&self) -> Vec<Reading> {
        self.rows.iter().map(TrainingRow::reading).collect()
    }
}

/// A feature vector and the label it was collected under.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledFeatures {
    pub features: FeatureVector,
    pub label: Label,
}

/// Dataset errors.
#[derive(Debug)]
pub enum DatasetError {
    Io(String),
    Csv(String),
    InvalidLabel { row: usize, code: u8 },
    Resample(ResampleError),
    Feature(FeatureError),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io(e) => write!(f, "IO error: {e}"),
            DatasetError::Csv(e) => write!(f, "CSV error: {e}"),
            DatasetError::InvalidLabel { row, code } => {
                write!(f, "Row {row}: label {code} is not a training label (0 or 1)")
            }
            DatasetError::Resample(e) => write!(f, "Resample error: {e}"),
            DatasetError::Feature(e) => write!(f, "Feature error: {e}"),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        DatasetError::Csv(e.to_string())
    }
}

impl From<ResampleError> for DatasetError {
    fn from(e: ResampleError) -> Self {
        DatasetError::Resample(e)
    }
}

impl From<FeatureError> for DatasetError {
    fn from(e: FeatureError) -> Self {
        DatasetError::Feature(e)
    }
}

/// Appends labeled segments to a training CSV.
pub struct TrainingWriter {
    writer: csv::Writer<std::fs::File>,
    rows_written: usize,
}

impl TrainingWriter {
    /// Open `path` for appending. The header is written only for a new file.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatasetError::Io(e.to_string()))?;
        }
        let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DatasetError::Io(format!("{}: {e}", path.display())))?;

        Ok(Self {
            writer: csv::WriterBuilder::new()
                .has_headers(needs_header)
                .from_writer(file),
            rows_written: 0,
        })
    }

    /// Write one row per reading. Segments labeled `Ignore` are skipped.
    pub fn write_segment(
        &mut self,
        segment: &FinalizedSegment,
        label: Label,
    ) -> Result<usize, DatasetError> {
        if !label.is_trainable() {
            return Ok(0);
        }
        for sample in &segment.readings {
            let r = sample.reading;
            self.writer.serialize(TrainingRow {
                ax: r.ax,
                ay: r.ay,
                az: r.az,
                gx: r.gx,
                gy: r.gy,
                gz: r.gz,
                timestamp: sample.timestamp.timestamp_micros() as f64 / 1e6,
                label: label.code(),
            })?;
        }
        self.writer
            .flush()
            .map_err(|e| DatasetError::Io(e.to_string()))?;
        self.rows_written += segment.len();
        Ok(segment.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

/// Load a training CSV, sorted by timestamp.
///
/// The sort is stable, so rows sharing a timestamp keep file order.
pub fn load_training_csv(path: impl AsRef<Path>) -> Result<Vec<TrainingRow>, DatasetError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<TrainingRow>().enumerate() {
        let row = row?;
        if !Label::from_code(row.label).is_some_and(Label::is_trainable) {
            return Err(DatasetError::InvalidLabel {
                row: i + 1,
                code: row.label,
            });
        }
        rows.push(row);
    }
    rows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    Ok(rows)
}

/// Cut rows into segments on a time gap larger than `gap` or a label change.
///
/// Segments with [`MAX_DISCARDED_ROWS`] rows or fewer are dropped.
pub fn segment_rows(rows: &[TrainingRow], gap: f64) -> Vec<TrainingSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<TrainingRow> = Vec::new();

    let mut flush = |current: &mut Vec<TrainingRow>| {
        let rows = std::mem::take(current);
        if rows.len() <= MAX_DISCARDED_ROWS {
            return;
        }
        if let Some(label) = Label::from_code(rows[0].label) {
            segments.push(TrainingSegment { label, rows });
        }
    };

    for row in rows {
        if let Some(prev) = current.last() {
            if row.timestamp - prev.timestamp > gap || row.label != prev.label {
                flush(&mut current);
            }
        }
        current.push(row.clone());
    }
    flush(&mut current);

    segments
}

/// Rebuild labeled feature vectors from a training CSV.
pub fn build_feature_set(
    path: impl AsRef<Path>,
    target_size: usize,
) -> Result<Vec<LabeledFeatures>, DatasetError> {
    let rows = load_training_csv(path)?;
    let segments = segment_rows(&rows, SEGMENT_GAP_SECS);
    tracing::info!(rows = rows.len(), segments = segments.len(), "Segmented training data");

    let mut extractor = FeatureExtractor::new();
    segments
        .iter()
        .map(|segment| {
            let fixed = resample(&segment.samples(), target_size, ResampleMode::Training)?;
            Ok(LabeledFeatures {
                features: extractor.extract(&fixed)?,
                label: segment.label,
            })
        })
        .collect()
}

/// Export feature vectors with a trailing `label` column.
pub fn write_feature_csv(
    path: impl AsRef<Path>,
    features: &[LabeledFeatures],
) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = FeatureVector::column_names();
    header.push("label".to_string());
    writer.write_record(&header)?;

    for item in features {
        let mut record: Vec<String> = item
            .features
            .as_slice()
            .iter()
            .map(|v| v.to_string())
            .collect();
        record.push(item.label.code().to_string());
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| DatasetError::Io(e.to_string()))?;
    Ok(())
}
