//! Count rate and dose rate from Geiger tube events.
//!
//! Events are summed into fixed `sample_interval_ms` buckets which feed a
//! [`MovingAverage`]. Two estimators read the result:
//!
//! * [`rate_timer`]: total events over the whole epoch. Noisy at first,
//!   converges as the epoch grows.
//! * [`rate_average`]: sum of the last `buffer_size` buckets. Steadier, but
//!   lags by roughly `buffer_size * sample_interval_ms`.

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::clock::Clock;
use crate::moving_average::MovingAverage;

/// Calibration and bucketing for one tube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeigerConfig {
    /// Width of one moving average bucket.
    pub sample_interval_ms: u32,
    /// Number of buckets in the moving average.
    pub buffer_size: usize,
    /// Dose rate per CPM, in the unit the readings are reported in.
    pub cpm_to_dose: f32,
}

impl GeigerConfig {
    /// SBM-20 tube, dose in nSv/h: 1000 / 175.43.
    pub const fn sbm20() -> Self {
        Self {
            sample_interval_ms: 3000,
            buffer_size: 10,
            cpm_to_dose: 5.7002793,
        }
    }
    pub fn validate(&self) -> Result<NonZeroUsize, ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !self.cpm_to_dose.is_finite() || self.cpm_to_dose < 0.0 {
            return Err(ConfigError::BadConversion(self.cpm_to_dose));
        }
        NonZeroUsize::new(self.buffer_size).ok_or(ConfigError::ZeroBufferSize)
    }
}

impl Default for GeigerConfig {
    fn default() -> Self {
        Self::sbm20()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroInterval,
    ZeroBufferSize,
    BadConversion(f32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroInterval => write!(f, "sample interval must be at least 1 ms"),
            Self::ZeroBufferSize => write!(f, "moving average needs at least one sample"),
            Self::BadConversion(x) => write!(f, "invalid CPM to dose factor: {x}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A count rate and the dose rate derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub cpm: u64,
    pub dose: u64,
}

fn dose_from_cpm(cpm: f64, cpm_to_dose: f32) -> u64 {
    (cpm * f64::from(cpm_to_dose)).round() as u64
}

/// Rate over the whole epoch. Zero until a full second has elapsed.
pub fn rate_timer(total: u64, elapsed_ms: u32, cpm_to_dose: f32) -> Rate {
    let secs = u64::from(elapsed_ms / 1000);
    if secs == 0 {
        return Rate::default();
    }
    let cpm = total * 60 / secs;
    Rate {
        cpm,
        dose: dose_from_cpm(cpm as f64, cpm_to_dose),
    }
}

/// Rate from the moving average, normalized by the buckets actually filled
/// so the warm-up period is not underestimated.
pub fn rate_average(average: &MovingAverage, sample_interval_ms: u32, cpm_to_dose: f32) -> Rate {
    if average.is_empty() {
        return Rate::default();
    }
    let n = average.len().max(1) as f64;
    let scale = 60_000.0 / (f64::from(sample_interval_ms) * n);
    let cpm = scale * average.average() as f64;
    Rate {
        cpm: cpm.round() as u64,
        dose: dose_from_cpm(cpm, cpm_to_dose),
    }
}

/// Collects tube events and keeps the state both estimators read.
///
/// An epoch begins at construction and again at every
/// [`reset_count`](Self::reset_count).
#[derive(Debug)]
pub struct Geiger<C> {
    config: GeigerConfig,
    clock: C,
    total_count: u64,
    start_ms: u32,
    interval_count: u16,
    interval_index: u32,
    average: MovingAverage,
}

impl<C: Clock> Geiger<C> {
    pub fn new(config: GeigerConfig, clock: C) -> Result<Self, ConfigError> {
        let capacity = config.validate()?;
        let mut geiger = Self {
            config,
            clock,
            total_count: 0,
            start_ms: 0,
            interval_count: 0,
            interval_index: 1,
            average: MovingAverage::new(capacity),
        };
        geiger.reset_count();
        Ok(geiger)
    }

    pub fn reset_count(&mut self) {
        self.total_count = 0;
        self.interval_count = 0;
        self.interval_index = 1;
        self.average.reset();
        self.start_ms = self.clock.millis();
    }

    /// Registers `num` events seen since the previous call.
    ///
    /// At most one bucket is flushed per call. If the caller is slower than
    /// `sample_interval_ms`, missed boundaries collapse into that one flush.
    ///
    /// The boundary wraps together with the elapsed time, so an epoch longer
    /// than `u32::MAX` ms keeps flushing after a few seconds of extra flushes
    /// around the wrap.
    pub fn add_count(&mut self, num: u16) {
        self.total_count += u64::from(num);
        let boundary = self.interval_index.wrapping_mul(self.config.sample_interval_ms);
        if self.elapsed_ms() >= boundary {
            self.average.add(self.interval_count);
            self.interval_count = num;
            self.interval_index = self.interval_index.wrapping_add(1);
        } else {
            self.interval_count = self.interval_count.saturating_add(num);
        }
    }

    pub fn rate_timer(&self) -> Rate {
        rate_timer(self.total_count, self.elapsed_ms(), self.config.cpm_to_dose)
    }

    pub fn rate_average(&self) -> Rate {
        rate_average(
            &self.average,
            self.config.sample_interval_ms,
            self.config.cpm_to_dose,
        )
    }

    pub fn elapsed_ms(&self) -> u32 {
        self.clock.millis().wrapping_sub(self.start_ms)
    }
    pub fn total_count(&self) -> u64 {
        self.total_count
    }
    /// Buckets currently held by the moving average.
    pub fn samples(&self) -> usize {
        self.average.len()
    }
}
