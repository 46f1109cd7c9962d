//! Acquisition state machine: one bounded location search at a time.
//!
//! Every search is bounded by the acquisition timer.  A fix resets the
//! motion debounce timer so a moving device is not re-triggered straight
//! away.  In single-fix mode (`fix_interval_secs == 0`) the receiver is
//! done after one fix and the machine returns to `Stopped`; in periodic
//! mode it stays `Active` and the acquisition timer bounds the wait for
//! the next fix.
//!
//! State changes only through [`Acquisition::start`], [`Acquisition::stop`],
//! [`Acquisition::on_fix`] and [`Acquisition::on_timeout`].  The location
//! source's own active/inactive reports are informational.

use log::{debug, info, warn};

use crate::app::ports::{AcquisitionSettings, LocationPort};
use crate::error::AcquisitionError;
use crate::events::{Event, EventPush};
use crate::timer::{TimerId, TimerMode, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    Stopped,
    Active,
}

/// What [`Acquisition::on_fix`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOutcome {
    /// First fix since boot.
    pub first: bool,
    /// The search ended with this fix.
    pub search_ended: bool,
}

pub struct Acquisition {
    state: AcquisitionState,
    settings: AcquisitionSettings,
    timeout_ms: u64,
    debounce_ms: u64,
    fixes: u32,
    timeouts: u32,
}

impl Acquisition {
    pub const fn new(settings: AcquisitionSettings, timeout_ms: u64, debounce_ms: u64) -> Self {
        Self {
            state: AcquisitionState::Stopped,
            settings,
            timeout_ms,
            debounce_ms,
            fixes: 0,
            timeouts: 0,
        }
    }

    pub const fn state(&self) -> AcquisitionState {
        self.state
    }

    pub const fn is_active(&self) -> bool {
        matches!(self.state, AcquisitionState::Active)
    }

    /// Fixes obtained since boot.
    pub const fn fix_count(&self) -> u32 {
        self.fixes
    }

    /// Searches that ended on the acquisition timer.
    pub const fn timeout_count(&self) -> u32 {
        self.timeouts
    }

    pub const fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Begin a search.
    ///
    /// Already `Active` → `AlreadyActive`, and the location source is not
    /// commanded again.  On success the acquisition timer is armed and
    /// `AcquisitionStarted` is pushed.
    pub fn start(
        &mut self,
        location: &mut impl LocationPort,
        timers: &Timers,
        events: &dyn EventPush,
        now_ms: u64,
    ) -> Result<(), AcquisitionError> {
        if self.is_active() {
            return Err(AcquisitionError::AlreadyActive);
        }

        location
            .start(&self.settings)
            .map_err(AcquisitionError::StartFailed)?;

        timers.arm(TimerId::Acquisition, now_ms, self.timeout_ms, TimerMode::OneShot);
        self.state = AcquisitionState::Active;
        info!("Acquisition: Stopped -> Active (timeout {}ms)", self.timeout_ms);

        if events.push(Event::AcquisitionStarted).is_err() {
            warn!("Acquisition: AcquisitionStarted dropped");
        }
        Ok(())
    }

    /// Abort a running search.  Idempotent.
    pub fn stop(
        &mut self,
        location: &mut impl LocationPort,
        timers: &Timers,
        events: &dyn EventPush,
    ) {
        if !self.is_active() {
            return;
        }
        self.end_search(location, timers, events);
        info!("Acquisition: Active -> Stopped (stopped)");
    }

    /// A fix arrived.
    ///
    /// Rearms the motion debounce timer and stops the search in single-fix
    /// mode.  Fixes that arrive while `Stopped` are still accepted: the
    /// receiver may deliver one last fix after a stop command.
    pub fn on_fix(&mut self, timers: &Timers, events: &dyn EventPush, now_ms: u64) -> FixOutcome {
        self.fixes = self.fixes.saturating_add(1);
        let first = self.fixes == 1;

        timers.arm(TimerId::MotionDebounce, now_ms, self.debounce_ms, TimerMode::OneShot);

        if !self.is_active() {
            debug!("Acquisition: fix while Stopped");
            return FixOutcome {
                first,
                search_ended: false,
            };
        }

        if self.settings.fix_interval_secs == 0 {
            timers.cancel(TimerId::Acquisition);
            self.state = AcquisitionState::Stopped;
            info!("Acquisition: Active -> Stopped (fix)");
            if events.push(Event::AcquisitionInactive).is_err() {
                warn!("Acquisition: AcquisitionInactive dropped");
            }
            FixOutcome {
                first,
                search_ended: true,
            }
        } else {
            // Periodic mode: bound the wait for the next fix.
            timers.arm(TimerId::Acquisition, now_ms, self.timeout_ms, TimerMode::OneShot);
            FixOutcome {
                first,
                search_ended: false,
            }
        }
    }

    /// The acquisition timer fired.
    ///
    /// Returns `false` for a stale expiry: the search already ended, or a
    /// newer search rearmed the timer after this event was queued.
    pub fn on_timeout(
        &mut self,
        location: &mut impl LocationPort,
        timers: &Timers,
        events: &dyn EventPush,
    ) -> bool {
        if !self.is_active() || timers.is_armed(TimerId::Acquisition) {
            debug!("Acquisition: stale timeout ignored ({:?})", self.state);
            return false;
        }

        self.timeouts = self.timeouts.saturating_add(1);
        self.end_search(location, timers, events);
        info!("Acquisition: Active -> Stopped (timeout)");
        true
    }

    fn end_search(
        &mut self,
        location: &mut impl LocationPort,
        timers: &Timers,
        events: &dyn EventPush,
    ) {
        if let Err(e) = location.stop() {
            warn!("Acquisition: stop command failed: {}", e);
        }
        timers.cancel(TimerId::Acquisition);
        self.state = AcquisitionState::Stopped;
        if events.push(Event::AcquisitionInactive).is_err() {
            warn!("Acquisition: AcquisitionInactive dropped");
        }
    }
}
