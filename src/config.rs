//! System configuration parameters
//!
//! All tunable parameters for the tracker core.  Buffer capacities are
//! compile-time constants (fixed memory); timing and policy knobs live in
//! [`TrackerConfig`] and can be loaded from JSON at startup.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Event queue depth.
pub const EVENT_QUEUE_CAPACITY: usize = 24;

/// Outbox depth.  Deliberately smaller than the telemetry rate so that
/// buffered data has a hard memory ceiling.
pub const OUTBOX_CAPACITY: usize = 8;

/// Largest encoded record the core will buffer or publish.
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Longest backend topic identifier.
pub const MAX_TOPIC_LEN: usize = 16;

/// Core tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // --- Acquisition ---
    /// Wall-clock bound on a single location search (seconds)
    pub acquisition_timeout_secs: u32,
    /// Interval between fixes while searching; 0 = single-fix navigation
    pub acquisition_fix_interval_secs: u32,
    /// Start a location search as soon as the dispatcher starts
    pub start_acquisition_on_boot: bool,

    // --- Motion ---
    /// Minimum time between motion-triggered acquisitions (seconds)
    pub motion_trigger_interval_secs: u32,

    // --- Connectivity ---
    /// Idle time after the last fix before the inactivity hook runs (seconds)
    pub inactivity_timeout_secs: u32,
    /// Drop the backend session when the inactivity timer fires
    pub disconnect_on_inactivity: bool,
    /// Tear the cellular link down after the first fix obtained with
    /// assistance data (power saving)
    pub release_cellular_after_first_fix: bool,

    // --- Indication ---
    /// Drive the status indicator
    pub use_indicator: bool,

    // --- Timing ---
    /// Resolution of the software timer tick (milliseconds)
    pub timer_tick_ms: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            // Acquisition
            acquisition_timeout_secs: 120,
            acquisition_fix_interval_secs: 0,
            start_acquisition_on_boot: true,

            // Motion
            motion_trigger_interval_secs: 600, // 10 min

            // Connectivity
            inactivity_timeout_secs: 60,
            disconnect_on_inactivity: false,
            release_cellular_after_first_fix: false,

            // Indication
            use_indicator: true,

            // Timing
            timer_tick_ms: 100, // 10 Hz
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default value.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.
    ///
    /// Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition_timeout_secs == 0 {
            return Err(ConfigError::Invalid("acquisition_timeout_secs must be > 0"));
        }
        if self.motion_trigger_interval_secs == 0 {
            return Err(ConfigError::Invalid("motion_trigger_interval_secs must be > 0"));
        }
        if self.inactivity_timeout_secs == 0 {
            return Err(ConfigError::Invalid("inactivity_timeout_secs must be > 0"));
        }
        if self.timer_tick_ms == 0 {
            return Err(ConfigError::Invalid("timer_tick_ms must be > 0"));
        }
        let shortest_ms = self
            .acquisition_timeout_secs
            .min(self.inactivity_timeout_secs)
            .min(self.motion_trigger_interval_secs) as u64
            * 1000;
        if self.timer_tick_ms as u64 > shortest_ms {
            return Err(ConfigError::Invalid(
                "timer_tick_ms must not exceed the shortest timeout",
            ));
        }
        Ok(())
    }

    pub fn acquisition_timeout_ms(&self) -> u64 {
        self.acquisition_timeout_secs as u64 * 1000
    }

    pub fn motion_trigger_interval_ms(&self) -> u64 {
        self.motion_trigger_interval_secs as u64 * 1000
    }

    pub fn inactivity_timeout_ms(&self) -> u64 {
        self.inactivity_timeout_secs as u64 * 1000
    }
}
