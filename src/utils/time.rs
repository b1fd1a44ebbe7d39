// src/utils/time.rs
//! Clocks and tick-rate measurement

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    fn now_micros(&self) -> u64 {
        self.now_nanos() / 1000
    }

    /// Seconds since the Unix epoch, the unit of board timestamp rows
    fn now_secs(&self) -> f64 {
        self.now_nanos() as f64 / 1e9
    }
}

/// System time provider using actual system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Mock time provider for deterministic testing
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance_by((secs * 1e9) as u64);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

pub fn current_timestamp_secs() -> f64 {
    current_timestamp_nanos() as f64 / 1e9
}

/// Exponentially smoothed ticks-per-second estimate.
///
/// The smoothing factor grows with the time since the previous tick
/// (`clamp(3 * dt, 0, 1)`), so a stalled loop converges quickly to its new
/// rate while a fast loop averages over many ticks.
#[derive(Debug, Clone, Default)]
pub struct TickRateMeter {
    last_tick_nanos: Option<u64>,
    rate_hz: Option<f64>,
}

impl TickRateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick at `now_nanos` and return the smoothed rate
    pub fn tick(&mut self, now_nanos: u64) -> Option<f64> {
        if let Some(last) = self.last_tick_nanos {
            let dt = now_nanos.saturating_sub(last) as f64 / 1e9;
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.rate_hz = Some(match self.rate_hz {
                    None => instant,
                    Some(previous) => {
                        let s = (dt * 3.0).clamp(0.0, 1.0);
                        previous * (1.0 - s) + instant * s
                    }
                });
            }
        }
        self.last_tick_nanos = Some(now_nanos);
        self.rate_hz
    }

    pub fn rate_hz(&self) -> Option<f64> {
        self.rate_hz
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
