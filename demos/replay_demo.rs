//! Demonstration of the DoorSense detection pipeline on a simulated door.
//!
//! This example shows how to:
//! 1. Open the seeded door simulator
//! 2. Calibrate the noise floor from a stationary burst
//! 3. Feed readings through detection and segmentation
//! 4. Resample each finalized segment and extract its features
//!
//! Run with: cargo run --example replay_demo

use chrono::{Duration, Utc};
use doorsense_agent::{
    config::Config,
    core::{FeatureExtractor, ResampleMode},
    pipeline::segment_features,
    source::{Channel, SampleSource, SimulatedConfig, SimulatedSource},
    Pipeline, SegmentOutcome, TimedReading,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("DoorSense Agent - Replay Demo");
    println!("=============================");
    println!();

    let config = Config::default();
    let mut source = SimulatedSource::new(SimulatedConfig::default(), 7)?;
    let mut pipeline = Pipeline::from_config(&config);
    let mut extractor = FeatureExtractor::new();

    let burst = (0..pipeline.window_size())
        .map(|_| source.read())
        .collect::<Result<Vec<_>, _>>()?;
    let calibration = pipeline.calibrate(&burst)?;
    println!("Thresholds:");
    for channel in Channel::ALL {
        println!(
            "  {:<3} {:.5}",
            channel.name(),
            calibration.threshold.get(channel)
        );
    }
    println!();

    let start = Utc::now();
    let tick = Duration::milliseconds(config.sampling.tick_period.as_millis() as i64);
    for n in 0..1_000 {
        let timestamp = start + tick * n;
        let outcome = pipeline.tick(TimedReading::new(source.read()?, timestamp))?;
        match outcome.segment {
            SegmentOutcome::Started => {
                println!("[{:>5}] movement started", n);
            }
            SegmentOutcome::Finalized(segment) => {
                let features = segment_features(
                    &mut extractor,
                    &segment.samples(),
                    config.resampling.target_size,
                    ResampleMode::Live,
                )?;
                println!(
                    "[{:>5}] segment of {} readings ({} ms): mean ax {:+.3}, var gz {:.1}",
                    n,
                    segment.len(),
                    segment.duration().num_milliseconds(),
                    features.mean(Channel::Ax),
                    features.variance(Channel::Gz)
                );
            }
            SegmentOutcome::Discarded { len } => {
                println!("[{:>5}] discarded {} reading(s)", n, len);
            }
            SegmentOutcome::Idle | SegmentOutcome::Collecting => {}
        }
    }

    Ok(())
}
