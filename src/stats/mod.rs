//! Runtime statistics for the DoorSense pipeline.
//!
//! Counters are lock-free and shared between the sampling loop and the
//! publish worker. They are persisted across sessions: a running agent
//! saves them at every control poll (once per second) and again at exit, so
//! `doorsense status` can report totals while the agent is running.

pub mod counters;

pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, Counter, PipelineStats,
    SharedPipelineStats, StatsSnapshot,
};
