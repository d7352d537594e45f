//! Seeded synthetic door sensor.
//!
//! Emits stationary noise around a resting orientation (gravity on z) and
//! injects a door swing every `gesture_every` samples. Swings alternate
//! between opening (positive yaw rate) and closing (negative yaw rate).

use crate::source::types::Reading;
use crate::source::{SampleSource, SourceError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Shape of the simulated signal.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Noise standard deviation on accelerometer channels (g)
    pub accel_noise: f64,
    /// Noise standard deviation on gyroscope channels (deg/s)
    pub gyro_noise: f64,
    /// Samples between the start of consecutive swings
    pub gesture_every: usize,
    /// Samples per swing
    pub gesture_len: usize,
    /// Peak lateral acceleration during a swing (g)
    pub accel_amplitude: f64,
    /// Peak yaw rate during a swing (deg/s)
    pub gyro_amplitude: f64,
    /// Stationary samples before the first swing
    pub quiet_start: usize,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            accel_noise: 0.004,
            gyro_noise: 0.15,
            gesture_every: 120,
            gesture_len: 15,
            accel_amplitude: 0.35,
            gyro_amplitude: 60.0,
            quiet_start: 400,
        }
    }
}

/// Synthetic source producing noise plus periodic swings.
pub struct SimulatedSource {
    config: SimulatedConfig,
    rng: StdRng,
    accel: Normal<f64>,
    gyro: Normal<f64>,
    tick: usize,
}

impl SimulatedSource {
    pub fn new(config: SimulatedConfig, seed: u64) -> Result<Self, SourceError> {
        let noise = |std: f64| {
            Normal::new(0.0, std)
                .map_err(|e| SourceError::Invalid(format!("invalid noise level {std}: {e}")))
        };
        Ok(Self {
            accel: noise(config.accel_noise)?,
            gyro: noise(config.gyro_noise)?,
            config,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
        })
    }

    /// Swing envelope at the current tick, signed by direction, or 0 when resting.
    fn swing(&self) -> f64 {
        let cfg = &self.config;
        if self.tick < cfg.quiet_start || cfg.gesture_every == 0 || cfg.gesture_len == 0 {
            return 0.0;
        }
        let since = self.tick - cfg.quiet_start;
        let phase = since % cfg.gesture_every;
        if phase >= cfg.gesture_len {
            return 0.0;
        }
        let direction = if (since / cfg.gesture_every) % 2 == 0 {
            1.0
        } else {
            -1.0
        };
        let t = phase as f64 / cfg.gesture_len as f64;
        direction * (std::f64::consts::PI * t).sin()
    }
}

impl SampleSource for SimulatedSource {
    fn read(&mut self) -> Result<Reading, SourceError> {
        let swing = self.swing();
        let cfg = &self.config;
        let reading = Reading::new(
            swing.abs() * cfg.accel_amplitude + self.accel.sample(&mut self.rng),
            swing * cfg.accel_amplitude * 0.5 + self.accel.sample(&mut self.rng),
            1.0 + self.accel.sample(&mut self.rng),
            self.gyro.sample(&mut self.rng),
            self.gyro.sample(&mut self.rng),
            swing * cfg.gyro_amplitude + self.gyro.sample(&mut self.rng),
        );
        self.tick += 1;
        Ok(reading)
    }
}
