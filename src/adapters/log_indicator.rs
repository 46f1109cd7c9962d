//! Log-based indicator adapter.
//!
//! Implements [`IndicatorPort`] by writing each pattern change to the
//! logger.  Stands in for the LED driver on hosts without one.

use log::info;

use crate::app::ports::{IndicatorMode, IndicatorPort};

#[derive(Debug, Default)]
pub struct LogIndicator {
    mode: IndicatorMode,
    changes: u32,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> IndicatorMode {
        self.mode
    }

    /// Pattern changes since construction.
    pub fn changes(&self) -> u32 {
        self.changes
    }
}

impl IndicatorPort for LogIndicator {
    fn set_mode(&mut self, mode: IndicatorMode) {
        let pattern = match mode {
            IndicatorMode::Off => "off",
            IndicatorMode::Glow => "glow",
            IndicatorMode::FastBlink => "fast blink",
            IndicatorMode::Solid => "solid",
            IndicatorMode::Error => "error",
        };
        info!("LED | {:?} -> {}", self.mode, pattern);
        self.mode = mode;
        self.changes = self.changes.saturating_add(1);
    }
}
