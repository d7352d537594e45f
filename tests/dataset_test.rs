//! Collection mode through to exported training features.

use chrono::{TimeZone, Utc};
use doorsense_agent::config::SamplingConfig;
use doorsense_agent::core::calibration::CalibrationEngine;
use doorsense_agent::core::detector::MovementDetector;
use doorsense_agent::core::resample::{resample, ResampleMode};
use doorsense_agent::core::segment::{SegmentCollector, SegmentConfig};
use doorsense_agent::dataset::{
    build_feature_set, load_training_csv, segment_rows, write_feature_csv, TrainingWriter,
    SEGMENT_GAP_SECS,
};
use doorsense_agent::labeler::ScriptedLabeler;
use doorsense_agent::source::ReplaySource;
use doorsense_agent::stats::create_shared_stats;
use doorsense_agent::{Label, Pacing, Pipeline, Reading, Runner, RunnerOptions, StopReason};

fn recording(gestures: &[f64]) -> Vec<Reading> {
    let mut readings: Vec<Reading> = (0..200)
        .map(|i| {
            let ax = if i % 2 == 0 { 0.05 } else { -0.05 };
            Reading::new(ax, 0.0, 1.0, 0.0, 0.0, 0.0)
        })
        .collect();
    for &ax in gestures {
        readings.extend(std::iter::repeat(Reading::new(ax, 0.0, 1.0, 0.0, 0.0, 0.0)).take(30));
        readings.extend(std::iter::repeat(Reading::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0)).take(30));
    }
    readings
}

fn runner(readings: Vec<Reading>) -> Runner<ReplaySource> {
    Runner::new(
        ReplaySource::from_readings(readings),
        Pipeline::new(
            CalibrationEngine::new(200),
            MovementDetector::new(5),
            SegmentCollector::new(SegmentConfig::default()),
        ),
        create_shared_stats(),
        RunnerOptions {
            sampling: SamplingConfig::default(),
            max_consecutive_faults: 3,
            pacing: Pacing::Virtual {
                start: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            },
            control_path: None,
            control_poll_interval: doorsense_agent::runner::CONTROL_POLL_INTERVAL,
            max_ticks: None,
        },
    )
}

#[test]
fn test_collect_then_export_features() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.csv");

    let mut runner = runner(recording(&[0.5, -0.5, 0.5]));
    let mut labeler = ScriptedLabeler::new([Label::Open, Label::Ignore, Label::Closed]);
    let mut writer = TrainingWriter::append(&train_path).unwrap();
    let summary = runner.collect(&mut labeler, &mut writer).unwrap();

    assert_eq!(summary.segments, 3);
    assert_eq!(summary.stop, StopReason::SourceExhausted);
    assert_eq!(labeler.remaining(), 0);
    // 26 swing readings plus the closing rest reading, twice
    assert_eq!(writer.rows_written(), 54);

    let header = std::fs::read_to_string(&train_path).unwrap();
    assert!(header.starts_with("ax,ay,az,gx,gy,gz,timestamp,label\n"));

    let rows = load_training_csv(&train_path).unwrap();
    assert_eq!(rows.len(), 54);
    let segments = segment_rows(&rows, SEGMENT_GAP_SECS);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].label, Label::Open);
    assert_eq!(segments[1].label, Label::Closed);
    assert_eq!(segments[0].len(), 27);

    let features = build_feature_set(&train_path, 100).unwrap();
    assert_eq!(features.len(), 2);
    assert!(features[0].features.as_slice()[0] > 0.4);

    let out = dir.path().join("features.csv");
    write_feature_csv(&out, &features).unwrap();
    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 19);
    assert_eq!(&headers[18], "label");
    let labels: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[18].to_string())
        .collect();
    assert_eq!(labels, vec!["1", "0"]);
}

#[test]
fn test_labeler_can_end_collection() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.csv");

    let mut runner = runner(recording(&[0.5, -0.5, 0.5]));
    let mut labeler = ScriptedLabeler::new([Label::Closed]);
    let mut writer = TrainingWriter::append(&train_path).unwrap();
    let summary = runner.collect(&mut labeler, &mut writer).unwrap();

    assert_eq!(summary.stop, StopReason::HandlerFinished);
    assert_eq!(summary.segments, 2);
    assert_eq!(writer.rows_written(), 27);
}

#[test]
fn test_append_keeps_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.csv");

    for _ in 0..2 {
        let mut runner = runner(recording(&[0.5]));
        let mut writer = TrainingWriter::append(&train_path).unwrap();
        runner
            .collect(&mut ScriptedLabeler::new([Label::Open]), &mut writer)
            .unwrap();
    }

    let content = std::fs::read_to_string(&train_path).unwrap();
    assert_eq!(content.matches("timestamp").count(), 1);
    assert_eq!(load_training_csv(&train_path).unwrap().len(), 54);
}

#[test]
fn test_training_resample_subsamples_long_segments() {
    let segment: Vec<Reading> = (0..300)
        .map(|i| Reading::new(i as f64, 0.0, 0.0, 0.0, 0.0, 0.0))
        .collect();
    let fixed = resample(&segment, 100, ResampleMode::Training).unwrap();
    assert_eq!(fixed.len(), 100);
    // Every output is an original sample, not an interpolated value
    assert!(fixed.iter().all(|r| r.ax.fract() == 0.0));
    assert_eq!(fixed[0].ax, 0.0);
    assert_eq!(fixed[99].ax, 299.0);
}
