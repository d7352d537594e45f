//! Sample sources for the DoorSense agent.
//!
//! The sensor driver itself lives outside this crate; a source only has to
//! hand back one 6-axis reading per call. Two sources ship with the crate:
//! a CSV replay and a seeded simulator.

pub mod replay;
pub mod simulated;
pub mod types;

pub use replay::ReplaySource;
pub use simulated::{SimulatedConfig, SimulatedSource};
pub use types::{Channel, Reading, TimedReading, CHANNELS};

use std::path::PathBuf;

/// Anything that can produce one IMU reading per call.
pub trait SampleSource {
    /// Read the next sample.
    fn read(&mut self) -> Result<Reading, SourceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self) -> Result<Reading, SourceError> {
        (**self).read()
    }
}

/// Errors that can occur while reading samples.
#[derive(Debug)]
pub enum SourceError {
    /// The underlying device or file failed for this sample.
    Read(String),
    /// The source has no more samples to give.
    Exhausted,
    /// The source could not be opened.
    Open { path: PathBuf, message: String },
    /// The source was set up with arguments it cannot work with.
    Invalid(String),
}

impl SourceError {
    /// Whether the caller should stop polling this source.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceError::Exhausted | SourceError::Open { .. } | SourceError::Invalid(_)
        )
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Read(e) => write!(f, "Sensor read failed: {e}"),
            SourceError::Exhausted => write!(f, "Sample source exhausted"),
            SourceError::Open { path, message } => {
                write!(f, "Could not open sample source {path:?}: {message}")
            }
            SourceError::Invalid(e) => write!(f, "Invalid sample source: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Source selection as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Simulated,
    Replay(PathBuf),
}

impl SourceSpec {
    /// Parse `sim` or `replay:<path>`.
    pub fn parse(s: &str) -> Result<Self, SourceError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("sim") || s.eq_ignore_ascii_case("simulated") {
            return Ok(SourceSpec::Simulated);
        }
        match s.split_once(':') {
            Some((kind, path)) if kind.eq_ignore_ascii_case("replay") && !path.is_empty() => {
                Ok(SourceSpec::Replay(PathBuf::from(path)))
            }
            _ => Err(SourceError::Invalid(format!(
                "unknown source '{s}' (expected 'sim' or 'replay:<path>')"
            ))),
        }
    }

    /// Open the selected source.
    pub fn open(&self, seed: u64) -> Result<Box<dyn SampleSource + Send>, SourceError> {
        match self {
            SourceSpec::Simulated => Ok(Box::new(SimulatedSource::new(
                SimulatedConfig::default(),
                seed,
            )?)),
            SourceSpec::Replay(path) => Ok(Box::new(ReplaySource::from_path(path)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_spec_parsing() {
        assert_eq!(SourceSpec::parse("sim").unwrap(), SourceSpec::Simulated);
        assert_eq!(
            SourceSpec::parse("replay:/tmp/door.csv").unwrap(),
            SourceSpec::Replay(PathBuf::from("/tmp/door.csv"))
        );
        assert!(matches!(SourceSpec::parse("replay:"), Err(SourceError::Invalid(_))));
        assert!(matches!(SourceSpec::parse("i2c"), Err(SourceError::Invalid(_))));
    }

    #[test]
    fn test_terminal_errors() {
        assert!(SourceError::Exhausted.is_terminal());
        assert!(SourceError::Invalid("bad spec".into()).is_terminal());
        assert!(!SourceError::Read("bus timeout".into()).is_terminal());
    }
}
