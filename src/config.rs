//! Configuration for the DoorSense agent.

use crate::core::calibration::{CalibrationBasis, ACCEL_MULTIPLIER, GYRO_MULTIPLIER};
use crate::core::detector::MIN_CONSECUTIVE;
use crate::core::resample::TARGET_SIZE;
use crate::core::segment::{CoolDownAnchor, SegmentConfig, COOL_DOWN_MS, MIN_SEGMENT_SAMPLES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    pub segmentation: SegmentationConfig,
    pub resampling: ResamplingConfig,

    /// Fitted classifier artifacts
    pub models: ModelPaths,

    pub publish: PublishConfig,

    /// Path for stats and training data
    pub data_path: PathBuf,

    /// Whether processing is currently paused
    pub paused: bool,

    /// Bumped by `doorsense recalibrate`; a running agent recalibrates when it changes
    pub calibration_epoch: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doorsense-agent");

        Self {
            sampling: SamplingConfig::default(),
            calibration: CalibrationConfig::default(),
            detection: DetectionConfig::default(),
            segmentation: SegmentationConfig::default(),
            resampling: ResamplingConfig::default(),
            models: ModelPaths::in_dir(&data_dir.join("models")),
            publish: PublishConfig::default(),
            data_path: data_dir,
            paused: false,
            calibration_epoch: 0,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults if it is missing.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doorsense-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the persisted pipeline statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.sampling.tick_period.is_zero() || self.sampling.calibration_period.is_zero() {
            return invalid("sampling periods must be positive");
        }
        if self.calibration.window_size == 0 {
            return invalid("calibration.window_size must be positive");
        }
        if self.detection.min_consecutive == 0 {
            return invalid("detection.min_consecutive must be positive");
        }
        if self.detection.min_consecutive > self.calibration.window_size {
            return invalid("detection.min_consecutive cannot exceed calibration.window_size");
        }
        if self.resampling.target_size == 0 {
            return invalid("resampling.target_size must be positive");
        }
        if self.publish.queue_capacity == 0 {
            return invalid("publish.queue_capacity must be positive");
        }
        if self.publish.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown timezone '{}'",
                self.publish.timezone
            )));
        }
        Ok(())
    }
}

/// Tick periods for the main loop and the calibration burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    #[serde(with = "duration_ms_serde")]
    pub tick_period: Duration,
    #[serde(with = "duration_ms_serde")]
    pub calibration_period: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            calibration_period: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Readings per calibration burst, also the detection window size
    pub window_size: usize,
    pub accel_multiplier: f64,
    pub gyro_multiplier: f64,
    pub basis: CalibrationBasis,
    /// Consecutive sensor faults tolerated during the burst
    pub max_consecutive_faults: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_size: 200,
            accel_multiplier: ACCEL_MULTIPLIER,
            gyro_multiplier: GYRO_MULTIPLIER,
            basis: CalibrationBasis::Raw,
            max_consecutive_faults: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_consecutive: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_consecutive: MIN_CONSECUTIVE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    #[serde(with = "duration_ms_serde")]
    pub cool_down: Duration,
    pub cool_down_anchor: CoolDownAnchor,
    pub min_samples: usize,
    /// Forced close after this long; `null` disables the limit
    #[serde(with = "option_duration_ms_serde")]
    pub max_duration: Option<Duration>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            cool_down: Duration::from_millis(COOL_DOWN_MS as u64),
            cool_down_anchor: CoolDownAnchor::SegmentStart,
            min_samples: MIN_SEGMENT_SAMPLES,
            max_duration: Some(Duration::from_secs(10)),
        }
    }
}

impl SegmentationConfig {
    /// Collector settings in the collector's time type.
    pub fn to_segment_config(&self) -> SegmentConfig {
        let to_chrono = |d: Duration| {
            chrono::TimeDelta::from_std(d).unwrap_or(chrono::TimeDelta::MAX)
        };
        SegmentConfig {
            cool_down: to_chrono(self.cool_down),
            anchor: self.cool_down_anchor,
            min_samples: self.min_samples,
            max_duration: self.max_duration.map(to_chrono),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplingConfig {
    pub target_size: usize,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            target_size: TARGET_SIZE,
        }
    }
}

/// Locations of the three fitted classifier artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    pub scaler: PathBuf,
    pub reducer: PathBuf,
    pub model: PathBuf,
}

impl ModelPaths {
    /// Conventional file names inside one directory.
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            scaler: dir.join("scaler.json"),
            reducer: dir.join("reducer.json"),
            model: dir.join("model.json"),
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::in_dir(&PathBuf::from("models"))
    }
}

/// Where published door events go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Log each event
    Log,
    /// Append JSON lines to a file
    Jsonl { path: PathBuf },
    /// POST to an HTTP gateway (requires the `gateway` feature)
    Http { url: String, token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub topic: String,
    pub client_id: String,
    /// IANA timezone for event timestamps
    pub timezone: String,
    pub sink: SinkConfig,
    pub queue_capacity: usize,
    pub max_retries: u32,
    #[serde(with = "duration_ms_serde")]
    pub retry_backoff: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            topic: "door/state".to_string(),
            client_id: format!(
                "doorsense-{}-{}",
                hostname,
                &uuid::Uuid::new_v4().to_string()[..8]
            ),
            timezone: "UTC".to_string(),
            sink: SinkConfig::Log,
            queue_capacity: 32,
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as integer milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling.tick_period, Duration::from_millis(100));
        assert_eq!(config.sampling.calibration_period, Duration::from_millis(10));
        assert_eq!(config.calibration.window_size, 200);
        assert_eq!(config.detection.min_consecutive, 5);
        assert_eq!(config.segmentation.cool_down, Duration::from_millis(500));
        assert_eq!(config.resampling.target_size, 100);
        assert!(!config.paused);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["sampling"]["tick_period"], 100);
        assert_eq!(json["segmentation"]["cool_down"], 500);
        assert_eq!(json["segmentation"]["max_duration"], 10_000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "detection": { "min_consecutive": 3 },
                 "segmentation": { "max_duration": null, "cool_down_anchor": "last_movement" },
                 "publish": { "sink": { "type": "jsonl", "path": "/tmp/events.jsonl" } } }"#,
        )
        .unwrap();
        assert_eq!(config.detection.min_consecutive, 3);
        assert_eq!(config.segmentation.max_duration, None);
        assert_eq!(
            config.segmentation.cool_down_anchor,
            CoolDownAnchor::LastMovement
        );
        assert_eq!(config.calibration.window_size, 200);
        assert_eq!(
            config.publish.sink,
            SinkConfig::Jsonl {
                path: PathBuf::from("/tmp/events.jsonl")
            }
        );
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.detection.min_consecutive = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.publish.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.publish.timezone = "Europe/Berlin".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.paused = true;
        config.calibration_epoch = 4;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.paused);
        assert_eq!(loaded.calibration_epoch, 4);
    }

    #[test]
    fn test_segment_config_conversion() {
        let seg = SegmentationConfig::default().to_segment_config();
        assert_eq!(seg.cool_down, chrono::Duration::milliseconds(500));
        assert_eq!(seg.max_duration, Some(chrono::Duration::seconds(10)));
        assert_eq!(seg.min_samples, 3);
    }

    #[test]
    fn test_out_of_range_duration_saturates() {
        let config = SegmentationConfig {
            max_duration: Some(Duration::from_secs(u64::MAX)),
            ..SegmentationConfig::default()
        };
        let seg = config.to_segment_config();
        assert_eq!(seg.max_duration, Some(chrono::TimeDelta::MAX));
    }
}
