//! Reading types produced by a sample source.
//!
//! A reading is one 6-axis sample: accelerometer in g, gyroscope in deg/s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of channels in a reading.
pub const CHANNELS: usize = 6;

/// One of the six sensor channels, in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ax,
    Ay,
    Az,
    Gx,
    Gy,
    Gz,
}

impl Channel {
    /// All channels in reading order.
    pub const ALL: [Channel; CHANNELS] = [
        Channel::Ax,
        Channel::Ay,
        Channel::Az,
        Channel::Gx,
        Channel::Gy,
        Channel::Gz,
    ];

    /// Position of this channel within a reading.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this channel belongs to the accelerometer.
    pub fn is_accel(self) -> bool {
        matches!(self, Channel::Ax | Channel::Ay | Channel::Az)
    }

    /// Column name used in CSV files.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Ax => "ax",
            Channel::Ay => "ay",
            Channel::Az => "az",
            Channel::Gx => "gx",
            Channel::Gy => "gy",
            Channel::Gz => "gz",
        }
    }
}

/// A single 6-axis IMU reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

impl Reading {
    pub fn new(ax: f64, ay: f64, az: f64, gx: f64, gy: f64, gz: f64) -> Self {
        Self {
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
        }
    }

    /// Build a reading from channel values in reading order.
    pub fn from_array(values: [f64; CHANNELS]) -> Self {
        let [ax, ay, az, gx, gy, gz] = values;
        Self::new(ax, ay, az, gx, gy, gz)
    }

    /// Channel values in reading order.
    pub fn as_array(&self) -> [f64; CHANNELS] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }

    /// Value of a single channel.
    pub fn get(&self, channel: Channel) -> f64 {
        self.as_array()[channel.index()]
    }

    /// Per-channel absolute values.
    pub fn abs(&self) -> Self {
        Self::from_array(self.as_array().map(f64::abs))
    }

    /// True when every channel holds a finite number.
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

/// A reading paired with its capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedReading {
    pub reading: Reading,
    pub timestamp: DateTime<Utc>,
}

impl TimedReading {
    pub fn new(reading: Reading, timestamp: DateTime<Utc>) -> Self {
        Self { reading, timestamp }
    }

    /// Stamp a reading with the current time.
    pub fn now(reading: Reading) -> Self {
        Self::new(reading, Utc::now())
    }
}
