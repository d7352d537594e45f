//! Atomic pipeline counters with JSON persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const COUNTER_COUNT: usize = 13;

/// Everything the pipeline counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Readings,
    ReadFaults,
    Calibrations,
    SegmentsStarted,
    SegmentsFinalized,
    SegmentsDiscarded,
    SegmentsForced,
    PredictionsOpen,
    PredictionsClosed,
    ClassifyFailures,
    Published,
    PublishFailures,
    Dropped,
}

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::Readings,
        Counter::ReadFaults,
        Counter::Calibrations,
        Counter::SegmentsStarted,
        Counter::SegmentsFinalized,
        Counter::SegmentsDiscarded,
        Counter::SegmentsForced,
        Counter::PredictionsOpen,
        Counter::PredictionsClosed,
        Counter::ClassifyFailures,
        Counter::Published,
        Counter::PublishFailures,
        Counter::Dropped,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Counter::Readings => "Readings processed",
            Counter::ReadFaults => "Sensor read faults",
            Counter::Calibrations => "Calibrations",
            Counter::SegmentsStarted => "Segments started",
            Counter::SegmentsFinalized => "Segments finalized",
            Counter::SegmentsDiscarded => "Segments discarded (too short)",
            Counter::SegmentsForced => "Segments closed at max duration",
            Counter::PredictionsOpen => "Predicted Open",
            Counter::PredictionsClosed => "Predicted Closed",
            Counter::ClassifyFailures => "Classification failures",
            Counter::Published => "Events published",
            Counter::PublishFailures => "Publish failures",
            Counter::Dropped => "Events dropped (queue full)",
        }
    }
}

/// Pipeline statistics for the current session.
#[derive(Debug)]
pub struct PipelineStats {
    counters: [AtomicU64; COUNTER_COUNT],
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that load previous totals from `path` and save back to it.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous pipeline stats: {e}");
        }

        stats
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, count: u64) {
        self.counters[counter.slot()].fetch_add(count, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: Counter::ALL.iter().map(|&c| (c, self.get(c))).collect(),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }

    /// Save stats to disk. No-op without a persistence path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                counters: Counter::ALL.iter().map(|&c| (c, self.get(c))).collect(),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(persisted) = read_persisted(path)? {
                for (counter, value) in persisted.counters {
                    self.counters[counter.slot()].store(value, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub counters: BTreeMap<Counter, u64>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl StatsSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    /// Read the totals another process persisted, if any.
    pub fn read_persisted(path: &Path) -> Result<Option<(Self, DateTime<Utc>)>, std::io::Error> {
        Ok(read_persisted(path)?.map(|p| {
            let snapshot = StatsSnapshot {
                counters: p.counters,
                session_start: p.last_updated,
                session_duration_secs: 0,
            };
            (snapshot, p.last_updated)
        }))
    }

    pub fn summary(&self) -> String {
        let mut out = String::from("Pipeline Statistics:\n");
        for counter in Counter::ALL {
            out.push_str(&format!("- {}: {}\n", counter.label(), self.get(counter)));
        }
        out.push_str(&format!(
            "- Session duration: {} seconds",
            self.session_duration_secs
        ));
        out
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    counters: BTreeMap<Counter, u64>,
    last_updated: DateTime<Utc>,
}

fn read_persisted(path: &Path) -> Result<Option<PersistedStats>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let persisted = serde_json::from_str(&content).map_err(std::io::Error::other)?;
    Ok(Some(persisted))
}

/// Thread-safe shared pipeline stats.
pub type SharedPipelineStats = Arc<PipelineStats>;

pub fn create_shared_stats() -> SharedPipelineStats {
    Arc::new(PipelineStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedPipelineStats {
    Arc::new(PipelineStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = PipelineStats::new();
        stats.incr(Counter::Readings);
        stats.incr(Counter::Readings);
        stats.add(Counter::Dropped, 3);

        assert_eq!(stats.get(Counter::Readings), 2);
        assert_eq!(stats.get(Counter::Dropped), 3);
        assert_eq!(stats.get(Counter::Published), 0);
    }

    #[test]
    fn test_reset() {
        let stats = PipelineStats::new();
        stats.add(Counter::SegmentsFinalized, 10);
        stats.reset();
        assert_eq!(stats.snapshot().get(Counter::SegmentsFinalized), 0);
    }

    #[test]
    fn test_summary_lists_every_counter() {
        let summary = PipelineStats::new().summary();
        for counter in Counter::ALL {
            assert!(summary.contains(counter.label()));
        }
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let stats = PipelineStats::with_persistence(path.clone());
        stats.add(Counter::PredictionsOpen, 4);
        stats.incr(Counter::Calibrations);
        stats.save().unwrap();

        let reloaded = PipelineStats::with_persistence(path.clone());
        assert_eq!(reloaded.get(Counter::PredictionsOpen), 4);
        assert_eq!(reloaded.get(Counter::Calibrations), 1);

        let (snapshot, _) = StatsSnapshot::read_persisted(&path).unwrap().unwrap();
        assert_eq!(snapshot.get(Counter::PredictionsOpen), 4);
    }

    #[test]
    fn test_shared_across_threads() {
        let stats = create_shared_stats();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.incr(Counter::Readings);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.get(Counter::Readings), 400);
    }
}
