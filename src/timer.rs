//! Software timer facility.
//!
//! Three named, single-owner timers.  The dispatcher arms and cancels
//! them; a periodic tick source (hardware timer callback, host thread or
//! async task) calls [`Timers::tick`].  An expired timer never calls
//! application logic: it pushes exactly one [`Event`] into the queue.
//!
//! ```text
//!  Dispatcher ──arm/cancel──▶ ┌─────────┐
//!                             │ Timers  │──tick(now)──▶ EventPush ──▶ EventQueue
//!  Tick source ──tick(now)──▶ └─────────┘
//! ```
//!
//! Because a timer can expire and enqueue its event just before the
//! dispatcher cancels it, consumers must re-check state before acting on
//! a timer event.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use log::{debug, warn};

use crate::events::{Event, EventPush};

// ═══════════════════════════════════════════════════════════════
//  Timer identity
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerId {
    /// Backend idle period after the last fix.
    Inactivity = 0,
    /// Bound on a single location search.
    Acquisition = 1,
    /// Suppresses motion-triggered re-acquisition.
    MotionDebounce = 2,
}

impl TimerId {
    pub const COUNT: usize = 3;
    pub const ALL: [TimerId; Self::COUNT] =
        [Self::Inactivity, Self::Acquisition, Self::MotionDebounce];

    /// The event this timer synthesizes on expiry.
    pub const fn event(self) -> Event {
        match self {
            Self::Inactivity => Event::InactivityTimeout,
            Self::Acquisition => Event::AcquisitionTimeout,
            Self::MotionDebounce => Event::MotionRearmed,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Inactivity => "inactivity",
            Self::Acquisition => "acquisition",
            Self::MotionDebounce => "motion-debounce",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fire once, then disarm.
    OneShot,
    /// Fire every interval until cancelled.
    Periodic,
}

/// Bookkeeping for an armed timer.
#[derive(Debug, Clone, Copy)]
struct Slot {
    deadline_ms: u64,
    period_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Timers
// ═══════════════════════════════════════════════════════════════

/// The timer table, shareable between the dispatcher and the tick source.
pub struct Timers {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Option<Slot>; TimerId::COUNT]>>,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([None; TimerId::COUNT])),
        }
    }

    /// (Re)arm `id` to expire `after_ms` from `now_ms`.
    ///
    /// Re-arming an armed timer replaces its deadline.
    pub fn arm(&self, id: TimerId, now_ms: u64, after_ms: u64, mode: TimerMode) {
        let slot = Slot {
            deadline_ms: now_ms.saturating_add(after_ms),
            period_ms: match mode {
                TimerMode::OneShot => None,
                TimerMode::Periodic => Some(after_ms.max(1)),
            },
        };
        debug!("Timer '{}' armed for {}ms ({:?})", id.name(), after_ms, mode);
        self.slots.lock(|s| s.borrow_mut()[id as usize] = Some(slot));
    }

    /// Disarm `id`.  Returns whether it was armed.
    pub fn cancel(&self, id: TimerId) -> bool {
        let was_armed = self.slots.lock(|s| s.borrow_mut()[id as usize].take().is_some());
        if was_armed {
            debug!("Timer '{}' cancelled", id.name());
        }
        was_armed
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.slots.lock(|s| s.borrow()[id as usize].is_some())
    }

    /// Absolute expiry time of `id`, if armed.
    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.slots
            .lock(|s| s.borrow()[id as usize].map(|slot| slot.deadline_ms))
    }

    /// Milliseconds until `id` expires (0 if overdue), if armed.
    pub fn remaining(&self, id: TimerId, now_ms: u64) -> Option<u64> {
        self.deadline(id).map(|d| d.saturating_sub(now_ms))
    }

    /// Expire every timer whose deadline is at or before `now_ms`.
    ///
    /// Each expired timer pushes one event into `sink`.  A one-shot timer
    /// is disarmed; a periodic timer moves to its next deadline after
    /// `now_ms` (missed periods are not replayed).  Returns the number of
    /// timers that fired.
    pub fn tick(&self, now_ms: u64, sink: &dyn EventPush) -> usize {
        let mut fired: Vec<TimerId, { TimerId::COUNT }> = Vec::new();

        self.slots.lock(|s| {
            let mut slots = s.borrow_mut();
            for id in TimerId::ALL {
                let Some(slot) = slots[id as usize].as_mut() else {
                    continue;
                };
                if slot.deadline_ms > now_ms {
                    continue;
                }
                match slot.period_ms {
                    None => slots[id as usize] = None,
                    Some(period) => {
                        while slot.deadline_ms <= now_ms {
                            slot.deadline_ms = slot.deadline_ms.saturating_add(period);
                        }
                    }
                }
                // Capacity equals the number of timers.
                let _ = fired.push(id);
            }
        });

        // Push outside the lock: the queue takes its own critical section.
        for id in &fired {
            debug!("Timer '{}' expired", id.name());
            if sink.push(id.event()).is_err() {
                warn!("Timer '{}' expired but its event was dropped", id.name());
            }
        }
        fired.len()
    }
}
