//! DoorSense Agent - door open/close detection from a 6-axis IMU.
//!
//! The agent samples an accelerometer and gyroscope mounted on a door,
//! calibrates a per-channel noise floor while the door is still, cuts the
//! stream into movement segments, and classifies each segment as an
//! opening or a closing. Results are published as small JSON events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          DoorSense Agent                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌────────────┐  │
//! │  │  Source  │──▶│  Detector   │──▶│ Segment  │──▶│ Resample + │  │
//! │  │ (10 Hz)  │   │ (threshold) │   │collector │   │  features  │  │
//! │  └──────────┘   └─────────────┘   └──────────┘   └────────────┘  │
//! │       │                ▲                               │         │
//! │       ▼                │                               ▼         │
//! │  ┌──────────┐          │                        ┌────────────┐   │
//! │  │Calibrate │──────────┘                        │ Inference  │   │
//! │  │ (100 Hz) │                                   └────────────┘   │
//! │  └──────────┘                                          │         │
//! │                  ┌─────────────┐   ┌────────────┐      ▼         │
//! │                  │    Sink     │◀──│  Publish   │◀── DoorEvent   │
//! │                  │ (log/jsonl) │   │   worker   │                │
//! │                  └─────────────┘   └────────────┘                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use doorsense_agent::{config::Config, pipeline::Pipeline, SampleSource, SourceSpec};
//!
//! let config = Config::default();
//! let mut source = SourceSpec::Simulated.open(7).expect("simulator");
//! let mut pipeline = Pipeline::from_config(&config);
//!
//! let burst: Vec<_> = (0..config.calibration.window_size)
//!     .map(|_| source.read().expect("reading"))
//!     .collect();
//! pipeline.calibrate(&burst).expect("calibration");
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod inference;
pub mod labeler;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use core::{FeatureVector, FinalizedSegment, Label, SegmentOutcome};
pub use inference::InferenceContext;
pub use pipeline::{Pipeline, PipelineError, SegmentClassifier, TickOutcome};
pub use publish::{AsyncPublisher, DoorEvent, EventPublisher};
pub use runner::{Pacing, RunSummary, Runner, RunnerOptions, StopReason};
pub use source::{Reading, SampleSource, SourceSpec, TimedReading};
pub use stats::{PipelineStats, SharedPipelineStats};

#[cfg(feature = "gateway")]
pub use publish::http::{BlockingHttpPublisher, HttpPublisher};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
