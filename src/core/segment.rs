//! Segment collection over the detector's boolean stream.
//!
//! A segment opens on the first moving tick and collects every following
//! reading, moving or not, so trailing near-threshold samples stay attached.
//! It closes on a non-moving tick once the cool-down has elapsed, or when it
//! reaches the maximum duration. Segments shorter than `min_samples` are
//! dropped on close.

use crate::source::types::{Reading, TimedReading};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default cool-down before a segment may close (milliseconds).
pub const COOL_DOWN_MS: i64 = 500;

/// Segments with fewer readings than this are discarded.
pub const MIN_SEGMENT_SAMPLES: usize = 3;

/// Reference point for the cool-down measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolDownAnchor {
    /// Elapsed time since the segment opened
    #[default]
    SegmentStart,
    /// Elapsed time since the last moving tick
    LastMovement,
}

/// Why a segment was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    CoolDown,
    MaxDuration,
}

/// Collector tuning.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub cool_down: Duration,
    pub anchor: CoolDownAnchor,
    pub min_samples: usize,
    pub max_duration: Option<Duration>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            cool_down: Duration::milliseconds(COOL_DOWN_MS),
            anchor: CoolDownAnchor::SegmentStart,
            min_samples: MIN_SEGMENT_SAMPLES,
            max_duration: Some(Duration::seconds(10)),
        }
    }
}

/// A closed movement segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedSegment {
    pub readings: Vec<TimedReading>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub reason: FinalizeReason,
}

impl FinalizedSegment {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings without timestamps, in capture order.
    pub fn samples(&self) -> Vec<Reading> {
        self.readings.iter().map(|r| r.reading).collect()
    }

    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// Collector state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Collecting,
}

/// What happened to the segment on this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    /// No segment open and none started
    Idle,
    /// A new segment opened with this reading
    Started,
    /// The open segment absorbed this reading
    Collecting,
    /// The open segment closed and is long enough to classify
    Finalized(FinalizedSegment),
    /// The open segment closed but was too short
    Discarded { len: usize },
}

#[derive(Debug)]
struct OpenSegment {
    readings: Vec<TimedReading>,
    started_at: DateTime<Utc>,
    last_movement_at: DateTime<Utc>,
}

/// Two-state machine (Idle, Collecting) assembling movement segments.
///
/// At most one segment is open at a time.
#[derive(Debug)]
pub struct SegmentCollector {
    config: SegmentConfig,
    open: Option<OpenSegment>,
}

impl SegmentCollector {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config, open: None }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub fn state(&self) -> CollectorState {
        if self.open.is_some() {
            CollectorState::Collecting
        } else {
            CollectorState::Idle
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.open.is_some()
    }

    /// Number of readings in the open segment (0 when idle).
    pub fn open_len(&self) -> usize {
        self.open.as_ref().map_or(0, |s| s.readings.len())
    }

    /// Feed one tick.
    pub fn observe(&mut self, sample: TimedReading, moving: bool) -> SegmentOutcome {
        let now = sample.timestamp;

        let Some(open) = self.open.as_mut() else {
            if !moving {
                return SegmentOutcome::Idle;
            }
            self.open = Some(OpenSegment {
                readings: vec![sample],
                started_at: now,
                last_movement_at: now,
            });
            return SegmentOutcome::Started;
        };

        open.readings.push(sample);
        if moving {
            open.last_movement_at = now;
        }

        let anchor = match self.config.anchor {
            CoolDownAnchor::SegmentStart => open.started_at,
            CoolDownAnchor::LastMovement => open.last_movement_at,
        };
        if !moving && now - anchor > self.config.cool_down {
            return self.close(now, FinalizeReason::CoolDown);
        }

        if let Some(max) = self.config.max_duration {
            if now - open.started_at >= max {
                return self.close(now, FinalizeReason::MaxDuration);
            }
        }

        SegmentOutcome::Collecting
    }

    /// Drop the open segment without closing it. Returns its length.
    pub fn abandon(&mut self) -> Option<usize> {
        self.open.take().map(|s| s.readings.len())
    }

    fn close(&mut self, now: DateTime<Utc>, reason: FinalizeReason) -> SegmentOutcome {
        let Some(open) = self.open.take() else {
            return SegmentOutcome::Idle;
        };

        let len = open.readings.len();
        if len < self.config.min_samples {
            return SegmentOutcome::Discarded { len };
        }

        SegmentOutcome::Finalized(FinalizedSegment {
            readings: open.readings,
            started_at: open.started_at,
            ended_at: now,
            reason,
        })
    }
}
