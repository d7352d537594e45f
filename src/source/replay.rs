//! Replay of recorded readings from a CSV file.

use crate::source::types::Reading;
use crate::source::{SampleSource, SourceError};
use serde::Deserialize;
use std::path::Path;

/// Row layout of a recording. Additional columns are ignored.
#[derive(Debug, Deserialize)]
struct RecordedRow {
    ax: f64,
    ay: f64,
    az: f64,
    gx: f64,
    gy: f64,
    gz: f64,
}

/// Replays a fixed sequence of readings, one per call.
pub struct ReplaySource {
    readings: Vec<Reading>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    /// Replay an in-memory sequence.
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            position: 0,
            looping: false,
        }
    }

    /// Load a recording with `ax,ay,az,gx,gy,gz` columns.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let open_err = |message: String| SourceError::Open {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::Reader::from_path(path).map_err(|e| open_err(e.to_string()))?;
        let mut readings = Vec::new();
        for (line, row) in reader.deserialize::<RecordedRow>().enumerate() {
            let row = row.map_err(|e| open_err(format!("row {}: {e}", line + 1)))?;
            readings.push(Reading::new(row.ax, row.ay, row.az, row.gx, row.gy, row.gz));
        }

        tracing::debug!(path = ?path, samples = readings.len(), "Loaded replay recording");
        Ok(Self::from_readings(readings))
    }

    /// Restart from the beginning once the recording ends.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Number of readings in the recording.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl SampleSource for ReplaySource {
    fn read(&mut self) -> Result<Reading, SourceError> {
        if self.position >= self.readings.len() {
            if !self.looping || self.readings.is_empty() {
                return Err(SourceError::Exhausted);
            }
            self.position = 0;
        }
        let reading = self.readings[self.position];
        self.position += 1;
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_replay_in_order_then_exhausted() {
        let mut source = ReplaySource::from_readings(vec![
            Reading::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Reading::new(2.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        ]);
        assert_eq!(source.read().unwrap().ax, 1.0);
        assert_eq!(source.read().unwrap().ax, 2.0);
        assert!(matches!(source.read(), Err(SourceError::Exhausted)));
    }

    #[test]
    fn test_replay_looping() {
        let mut source =
            ReplaySource::from_readings(vec![Reading::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0)])
                .looping(true);
        for _ in 0..3 {
            assert_eq!(source.read().unwrap().ax, 1.0);
        }
    }

    #[test]
    fn test_replay_from_csv_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ax,ay,az,gx,gy,gz,timestamp,label").unwrap();
        writeln!(file, "0.1,0.2,0.98,1.5,-2.0,0.0,1700000000.0,1").unwrap();
        writeln!(file, "0.0,0.0,1.0,0.0,0.0,0.0,1700000000.1,1").unwrap();
        drop(file);

        let mut source = ReplaySource::from_path(&path).unwrap();
        assert_eq!(source.len(), 2);
        let first = source.read().unwrap();
        assert_eq!(first.as_array(), [0.1, 0.2, 0.98, 1.5, -2.0, 0.0]);
    }

    #[test]
    fn test_replay_missing_file() {
        let result = ReplaySource::from_path("/nonexistent/recording.csv");
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }
}
