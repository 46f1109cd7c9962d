//! Host clock adapter.
//!
//! Implements [`ClockPort`] with `std::time`:
//! - monotonic milliseconds from an `Instant` captured at construction;
//! - wall-clock time from `SystemTime`, reported as unsynchronised when it
//!   reads earlier than 2020-01-01 (an RTC that was never set).

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;

/// 2020-01-01T00:00:00Z in milliseconds.
const EPOCH_2020_MS: u64 = 1_577_836_800_000;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since construction (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn unix_time_ms(&self) -> Option<u64> {
        let ms = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_millis() as u64;
        (ms >= EPOCH_2020_MS).then_some(ms)
    }
}
