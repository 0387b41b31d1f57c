use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, Instant};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

// ---------------------------------------------------------------------------
// SimTime
// ---------------------------------------------------------------------------

/// Integer-nanosecond simulation clock.
///
/// Elapsed time is a monotonically increasing `u64` nanosecond count, so
/// thousands of 1 ms steps add up exactly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Resource,
)]
pub struct SimTime {
    nanos: u64,
}

impl SimTime {
    /// The zero instant.
    #[must_use]
    pub const fn new() -> Self {
        Self { nanos: 0 }
    }

    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Rounds to the nearest nanosecond. Negative inputs clamp to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_secs(secs: f64) -> Self {
        Self {
            nanos: (secs.max(0.0) * NANOS_PER_SEC).round() as u64,
        }
    }

    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_SEC
    }

    #[must_use]
    pub const fn to_duration(&self) -> Duration {
        Duration::from_nanos(self.nanos)
    }

    /// Advance the clock by `delta_nanos` nanoseconds (saturating).
    pub const fn advance(&mut self, delta_nanos: u64) {
        self.nanos = self.nanos.saturating_add(delta_nanos);
    }

    pub const fn reset(&mut self) {
        self.nanos = 0;
    }
}

impl Add<Duration> for SimTime {
    type Output = Self;

    #[allow(clippy::cast_possible_truncation)]
    fn add(self, rhs: Duration) -> Self {
        Self {
            nanos: self.nanos.saturating_add(rhs.as_nanos() as u64),
        }
    }
}

impl Sub for SimTime {
    type Output = Duration;

    /// Saturates at zero when `rhs` is later than `self`.
    fn sub(self, rhs: Self) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(rhs.nanos))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let millis = (self.nanos % 1_000_000_000) / 1_000_000;
        write!(f, "{secs}.{millis:03}s")
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-step scheduler deciding which periodic tasks fire on each step.
///
/// A task running at `freq` Hz fires on every step whose index is a multiple
/// of `round(1 / (freq * dt))`. Step 0 fires for every frequency.
#[derive(Debug, Clone, Resource)]
pub struct Scheduler {
    dt: f64,
    dt_nanos: u64,
    step: u64,
    time: SimTime,
    sync: bool,
    started: Option<Instant>,
}

impl Scheduler {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            dt_nanos: (dt.max(0.0) * NANOS_PER_SEC).round() as u64,
            step: 0,
            time: SimTime::new(),
            sync: false,
            started: None,
        }
    }

    /// When enabled, [`step`](Self::step) sleeps so that simulated time never
    /// runs ahead of wall-clock time.
    #[must_use]
    pub const fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub const fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    #[must_use]
    pub const fn sync(&self) -> bool {
        self.sync
    }

    /// Number of steps between two firings of a task at `freq` Hz.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn period_steps(&self, freq: f64) -> Result<u64, ConfigError> {
        if !(freq.is_finite() && freq > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "frequency".into(),
                message: format!("{freq} Hz is not a positive frequency"),
            });
        }
        let period = (1.0 / (freq * self.dt)).round();
        if period < 1.0 {
            return Err(ConfigError::FrequencyTooHigh {
                freq,
                physics_hz: 1.0 / self.dt,
            });
        }
        Ok(period as u64)
    }

    /// Whether a task running at `freq` Hz fires on the current step.
    ///
    /// Unreachable frequencies never fire; use
    /// [`period_steps`](Self::period_steps) to surface the error instead.
    pub fn schedule(&self, freq: f64) -> bool {
        self.period_steps(freq)
            .is_ok_and(|period| self.step % period == 0)
    }

    /// Move to the next step.
    pub fn step(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.step += 1;
        self.time.advance(self.dt_nanos);

        if self.sync {
            let elapsed = started.elapsed();
            let target = self.time.to_duration();
            if target > elapsed {
                std::thread::sleep(target - elapsed);
            }
        }
    }

    /// Simulated seconds per wall-clock second since the first step.
    pub fn real_time_factor(&self) -> Option<f64> {
        let elapsed = self.started?.elapsed().as_secs_f64();
        (elapsed > 0.0).then(|| self.time.secs_f64() / elapsed)
    }

    pub fn reset(&mut self) {
        self.step = 0;
        self.time.reset();
        self.started = None;
    }

    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.step
    }

    #[must_use]
    pub const fn time(&self) -> SimTime {
        self.time
    }

    /// Current simulated time in seconds.
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.time.secs_f64()
    }

    /// Simulated time after one more step.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn next_time(&self) -> f64 {
        (self.time.nanos() + self.dt_nanos) as f64 / NANOS_PER_SEC
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
