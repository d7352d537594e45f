//! Periodic sampling loop.
//!
//! The runner reads one sample per tick from a [`SampleSource`], runs the
//! calibration burst before the first tick, and hands every finalized
//! segment to either the live classifier or the collection labeler.
//!
//! A running agent is steered from other processes through the config file:
//! `paused` and `calibration_epoch` are re-read once per second, and the
//! counters are saved on the same schedule.

use crate::config::{Config, SamplingConfig};
use crate::core::calibration::{Calibration, CalibrationError};
use crate::core::segment::{FinalizeReason, FinalizedSegment, SegmentOutcome};
use crate::core::Label;
use crate::dataset::{DatasetError, TrainingWriter};
use crate::labeler::Labeler;
use crate::pipeline::{Pipeline, PipelineError, SegmentClassifier};
use crate::publish::AsyncPublisher;
use crate::source::types::{Channel, Reading, TimedReading};
use crate::source::{SampleSource, SourceError};
use crate::stats::{Counter, SharedPipelineStats};
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default interval between config file checks.
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How reading timestamps advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep out each period and stamp readings with the system clock
    RealTime,
    /// No sleeping; timestamps advance by exactly one period per tick
    Virtual { start: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub sampling: SamplingConfig,
    pub max_consecutive_faults: usize,
    pub pacing: Pacing,
    /// Config file polled for pause and recalibration requests
    pub control_path: Option<PathBuf>,
    pub control_poll_interval: Duration,
    /// Stop after this many main-loop ticks, paused ones included
    pub max_ticks: Option<u64>,
}

impl RunnerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sampling: config.sampling.clone(),
            max_consecutive_faults: config.calibration.max_consecutive_faults,
            pacing: Pacing::RealTime,
            control_path: None,
            control_poll_interval: CONTROL_POLL_INTERVAL,
            max_ticks: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_control_path(mut self, path: PathBuf) -> Self {
        self.control_path = Some(path);
        self
    }
}

/// Runner errors. All of them end the run.
#[derive(Debug)]
pub enum RunnerError {
    Calibration(CalibrationError),
    Source(SourceError),
    Pipeline(PipelineError),
    Dataset(DatasetError),
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Calibration(e) => write!(f, "{e}"),
            RunnerError::Source(e) => write!(f, "Sensor error: {e}"),
            RunnerError::Pipeline(e) => write!(f, "{e}"),
            RunnerError::Dataset(e) => write!(f, "Training data error: {e}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<CalibrationError> for RunnerError {
    fn from(e: CalibrationError) -> Self {
        RunnerError::Calibration(e)
    }
}

impl From<PipelineError> for RunnerError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Calibration(e) => RunnerError::Calibration(e),
            other => RunnerError::Pipeline(other),
        }
    }
}

impl From<DatasetError> for RunnerError {
    fn from(e: DatasetError) -> Self {
        RunnerError::Dataset(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    SourceExhausted,
    /// The segment handler asked to stop
    HandlerFinished,
    TickLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub segments: u64,
    pub stop: StopReason,
}

struct Clock {
    pacing: Pacing,
    virtual_now: Option<DateTime<Utc>>,
}

impl Clock {
    fn new(pacing: Pacing) -> Self {
        let virtual_now = match pacing {
            Pacing::RealTime => None,
            Pacing::Virtual { start } => Some(start),
        };
        Self {
            pacing,
            virtual_now,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.virtual_now.unwrap_or_else(Utc::now)
    }

    /// Wait out the rest of `period`, counting the work done since `started`.
    fn pace(&mut self, period: Duration, started: Instant) {
        match self.pacing {
            Pacing::RealTime => {
                if let Some(rest) = period.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
            Pacing::Virtual { .. } => {
                if let (Some(now), Ok(step)) =
                    (self.virtual_now, chrono::Duration::from_std(period))
                {
                    self.virtual_now = Some(now + step);
                }
            }
        }
    }
}

struct ControlState {
    path: PathBuf,
    last_check: Instant,
    paused: bool,
    epoch: u64,
}

/// Drives a [`Pipeline`] from a [`SampleSource`].
pub struct Runner<S> {
    source: S,
    pipeline: Pipeline,
    stats: SharedPipelineStats,
    running: Arc<AtomicBool>,
    options: RunnerOptions,
    clock: Clock,
    control: Option<ControlState>,
    recalibration_pending: bool,
}

impl<S: SampleSource> Runner<S> {
    pub fn new(
        source: S,
        pipeline: Pipeline,
        stats: SharedPipelineStats,
        options: RunnerOptions,
    ) -> Self {
        let clock = Clock::new(options.pacing);
        Self {
            source,
            pipeline,
            stats,
            running: Arc::new(AtomicBool::new(true)),
            options,
            clock,
            control: None,
            recalibration_pending: false,
        }
    }

    /// Flag that stops the loop when cleared (wired to Ctrl+C by the CLI).
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Collect one stationary burst at the calibration period.
    fn read_burst(&mut self) -> Result<Vec<Reading>, RunnerError> {
        let size = self.pipeline.window_size();
        let period = self.options.sampling.calibration_period;
        let mut readings = Vec::with_capacity(size);
        let mut consecutive_faults = 0usize;

        while readings.len() < size {
            let started = Instant::now();
            match self.source.read() {
                Ok(reading) => {
                    consecutive_faults = 0;
                    if let Some(channel) = Channel::ALL
                        .into_iter()
                        .find(|c| !reading.get(*c).is_finite())
                    {
                        return Err(CalibrationError::NonFinite {
                            index: readings.len(),
                            channel,
                        }
                        .into());
                    }
                    readings.push(reading);
                }
                Err(e) if e.is_terminal() => return Err(RunnerError::Source(e)),
                Err(e) => {
                    self.stats.incr(Counter::ReadFaults);
                    consecutive_faults += 1;
                    tracing::warn!(consecutive_faults, "Sensor read failed during calibration: {e}");
                    if consecutive_faults > self.options.max_consecutive_faults {
                        return Err(CalibrationError::SourceFaults {
                            consecutive: consecutive_faults,
                            last_error: e.to_string(),
                        }
                        .into());
                    }
                }
            }
            self.clock.pace(period, started);
        }
        Ok(readings)
    }

    /// Run the blocking calibration burst.
    pub fn calibrate(&mut self) -> Result<Calibration, RunnerError> {
        tracing::info!(
            samples = self.pipeline.window_size(),
            period_ms = self.options.sampling.calibration_period.as_millis() as u64,
            "Calibrating, keep the door still"
        );
        let readings = self.read_burst()?;
        let calibration = self.pipeline.calibrate(&readings)?.clone();
        self.stats.incr(Counter::Calibrations);
        Ok(calibration)
    }

    fn try_recalibrate(&mut self) {
        if self.pipeline.is_collecting() {
            return;
        }
        self.recalibration_pending = false;
        tracing::info!("Recalibration requested");
        let result = self
            .read_burst()
            .and_then(|readings| Ok(self.pipeline.recalibrate(&readings)?.clone()));
        match result {
            Ok(_) => self.stats.incr(Counter::Calibrations),
            Err(e) => tracing::warn!("Recalibration failed, keeping previous thresholds: {e}"),
        }
    }

    fn poll_control(&mut self) {
        let Some(control) = self.control.as_mut() else {
            return;
        };
        if control.last_check.elapsed() < self.options.control_poll_interval {
            return;
        }
        control.last_check = Instant::now();

        if let Err(e) = self.stats.save() {
            tracing::debug!("Could not save pipeline stats: {e}");
        }

        match Config::load_from(&control.path) {
            Ok(cfg) => {
                if cfg.paused != control.paused {
                    control.paused = cfg.paused;
                    if cfg.paused {
                        tracing::info!("Pausing");
                    } else {
                        tracing::info!("Resuming");
                    }
                }
                if cfg.calibration_epoch != control.epoch {
                    control.epoch = cfg.calibration_epoch;
                    self.recalibration_pending = true;
                }
            }
            Err(e) => tracing::debug!("Could not reload config: {e}"),
        }
    }

    fn is_paused(&self) -> bool {
        self.control.as_ref().is_some_and(|c| c.paused)
    }

    /// Main loop. Calls `on_segment` for every finalized segment.
    ///
    /// Calibrates first if the pipeline has no thresholds yet.
    pub fn run<F>(&mut self, mut on_segment: F) -> Result<RunSummary, RunnerError>
    where
        F: FnMut(FinalizedSegment) -> Result<ControlFlow<()>, RunnerError>,
    {
        if let Some(path) = self.options.control_path.clone() {
            let initial = Config::load_from(&path).unwrap_or_default();
            if initial.paused {
                tracing::info!("Starting paused; run `doorsense resume` to start detecting");
            }
            self.control = Some(ControlState {
                path,
                last_check: Instant::now(),
                paused: initial.paused,
                epoch: initial.calibration_epoch,
            });
        }

        if !self.pipeline.is_calibrated() {
            self.calibrate()?;
        }

        let period = self.options.sampling.tick_period;
        let mut ticks = 0u64;
        let mut segments = 0u64;

        let stop = loop {
            if !self.running.load(Ordering::SeqCst) {
                break StopReason::Interrupted;
            }
            if self.options.max_ticks.is_some_and(|max| ticks >= max) {
                break StopReason::TickLimit;
            }

            let started = Instant::now();
            ticks += 1;
            self.poll_control();
            if self.is_paused() {
                self.clock.pace(period, started);
                continue;
            }
            if self.recalibration_pending {
                self.try_recalibrate();
            }

            let timestamp = self.clock.now();
            let reading = match self.source.read() {
                Ok(reading) if reading.is_finite() => reading,
                Ok(reading) => {
                    self.stats.incr(Counter::ReadFaults);
                    tracing::warn!(?reading, "Skipping non-finite reading");
                    self.clock.pace(period, started);
                    continue;
                }
                Err(e) if e.is_terminal() => {
                    tracing::info!("Sample source finished: {e}");
                    break StopReason::SourceExhausted;
                }
                Err(e) => {
                    self.stats.incr(Counter::ReadFaults);
                    tracing::warn!("Sensor read failed, skipping tick: {e}");
                    self.clock.pace(period, started);
                    continue;
                }
            };
            self.stats.incr(Counter::Readings);

            let outcome = self.pipeline.tick(TimedReading::new(reading, timestamp))?;
            match outcome.segment {
                SegmentOutcome::Started => self.stats.incr(Counter::SegmentsStarted),
                SegmentOutcome::Discarded { .. } => self.stats.incr(Counter::SegmentsDiscarded),
                SegmentOutcome::Finalized(segment) => {
                    self.stats.incr(Counter::SegmentsFinalized);
                    if segment.reason == FinalizeReason::MaxDuration {
                        self.stats.incr(Counter::SegmentsForced);
                    }
                    segments += 1;
                    if on_segment(segment)?.is_break() {
                        break StopReason::HandlerFinished;
                    }
                }
                SegmentOutcome::Idle | SegmentOutcome::Collecting => {}
            }

            self.clock.pace(period, started);
        };

        self.pipeline.abandon();
        tracing::info!(ticks, segments, ?stop, "Sampling stopped");
        Ok(RunSummary {
            ticks,
            segments,
            stop,
        })
    }

    /// Live prediction: classify each segment and publish the result.
    pub fn predict(
        &mut self,
        classifier: &mut SegmentClassifier,
        publisher: &AsyncPublisher,
    ) -> Result<RunSummary, RunnerError> {
        let stats = self.stats.clone();
        self.run(|segment| {
            match classifier.classify(&segment) {
                Ok(label) => {
                    stats.incr(match label {
                        Label::Open => Counter::PredictionsOpen,
                        _ => Counter::PredictionsClosed,
                    });
                    tracing::info!(%label, len = segment.len(), "Prediction");
                    if let Some(event) = classifier.event_for(label, &segment) {
                        publisher.submit(event);
                    }
                }
                Err(e) => {
                    stats.incr(Counter::ClassifyFailures);
                    tracing::warn!(len = segment.len(), "Could not classify segment: {e}");
                }
            }
            Ok(ControlFlow::Continue(()))
        })
    }

    /// Data collection: label each segment and append it to the training file.
    pub fn collect<L: Labeler>(
        &mut self,
        labeler: &mut L,
        writer: &mut TrainingWriter,
    ) -> Result<RunSummary, RunnerError> {
        let mut open = 0usize;
        let mut closed = 0usize;
        self.run(|segment| {
            let Some(label) = labeler.label(&segment) else {
                return Ok(ControlFlow::Break(()));
            };
            match label {
                Label::Ignore => {
                    tracing::info!(len = segment.len(), "Segment ignored");
                }
                Label::Open | Label::Closed => {
                    writer.write_segment(&segment, label)?;
                    if label == Label::Open {
                        open += 1;
                    } else {
                        closed += 1;
                    }
                    tracing::info!(%label, len = segment.len(), open, closed, "Segment recorded");
                }
            }
            Ok(ControlFlow::Continue(()))
        })
    }
}
