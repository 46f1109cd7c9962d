//! Event taxonomy and the bounded event queue.
//!
//! Events are produced by:
//! - Modem callbacks (cellular registration up/down)
//! - Backend client callbacks (session up/down, asynchronous errors)
//! - Location source callbacks (search started/stopped, fix, timeout,
//!   assistance data needed)
//! - Accelerometer interrupt (motion detected)
//! - Timer expiry (inactivity, acquisition timeout, motion re-arm)
//! - The dispatcher itself (AcquisitionStarted, deferred A-GPS requests)
//!
//! Events are consumed by the dispatcher run loop, one at a time, in
//! exactly the order they were pushed.  There are no priorities and no
//! coalescing.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Modem cb    │────▶│              │     │              │
//! │ Backend cb  │────▶│  EventQueue  │────▶│  Dispatcher  │
//! │ GNSS cb     │────▶│  (bounded,   │     │  (single     │
//! │ Accel ISR   │────▶│   try_send)  │     │   consumer)  │
//! │ Timers      │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::EVENT_QUEUE_CAPACITY;
use crate::error::QueueError;

// ═══════════════════════════════════════════════════════════════
//  Payloads
// ═══════════════════════════════════════════════════════════════

/// Fixed-point sensor reading: `integer + micro / 1_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorValue {
    pub integer: i32,
    pub micro: i32,
}

impl SensorValue {
    pub const fn new(integer: i32, micro: i32) -> Self {
        Self { integer, micro }
    }

    pub fn as_f64(self) -> f64 {
        self.integer as f64 + self.micro as f64 / 1_000_000.0
    }

    /// Flip the sign of both parts (axis mounted upside down).
    pub const fn inverted(self) -> Self {
        Self {
            integer: -self.integer,
            micro: -self.micro,
        }
    }
}

/// 3-axis accelerometer sample captured when motion was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    /// Wall-clock time of the sample (ms since Unix epoch); 0 = unknown.
    pub timestamp_ms: u64,
    pub x: SensorValue,
    pub y: SensorValue,
    pub z: SensorValue,
}

/// A successfully acquired position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f32,
    pub speed_kmh: f32,
    pub hdop: f32,
    pub satellites: u8,
    /// Wall-clock time of the fix (ms since Unix epoch); 0 = unknown.
    pub timestamp_ms: u64,
}

/// Assistance data the GNSS receiver is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgpsRequest {
    /// Satellites needing ephemeris, one bit per SV.
    pub sv_mask_ephemeris: u32,
    /// Satellites needing almanac, one bit per SV.
    pub sv_mask_almanac: u32,
    /// `AgpsRequest::*` flag bits.
    pub data_flags: u8,
}

impl AgpsRequest {
    pub const UTC: u8 = 0b0000_0001;
    pub const KLOBUCHAR: u8 = 0b0000_0010;
    pub const NEQUICK: u8 = 0b0000_0100;
    pub const SYSTEM_TIME_TOW: u8 = 0b0000_1000;
    pub const POSITION: u8 = 0b0001_0000;
    pub const INTEGRITY: u8 = 0b0010_0000;

    pub const fn has(&self, flag: u8) -> bool {
        self.data_flags & flag != 0
    }

    /// Nothing requested at all.
    pub const fn is_empty(&self) -> bool {
        self.sv_mask_ephemeris == 0 && self.sv_mask_almanac == 0 && self.data_flags == 0
    }
}

// ═══════════════════════════════════════════════════════════════
//  Event
// ═══════════════════════════════════════════════════════════════

/// A tagged event record.  `Copy`, fixed size, no heap: it is copied into
/// the queue by value from interrupt and callback contexts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    // ── Connectivity ──────────────────────────────────────
    CellularConnected,
    CellularDisconnected,
    BackendConnected,
    BackendDisconnected,
    /// Asynchronous backend failure with the client library's code.
    BackendError(i32),

    // ── Acquisition ───────────────────────────────────────
    /// Emitted by the dispatcher after it issued a start command.
    AcquisitionStarted,
    /// Location source reports the search is running.
    AcquisitionActive,
    /// Search has ended (stopped, timed out, or completed).
    AcquisitionInactive,
    /// Acquisition timer expired before a fix arrived.
    AcquisitionTimeout,
    AcquisitionFixAvailable(LocationFix),
    AgpsAssistanceNeeded(AgpsRequest),

    // ── Motion ────────────────────────────────────────────
    MotionDetected(MotionSample),
    /// Motion debounce interval has lapsed.
    MotionRearmed,

    // ── Housekeeping ──────────────────────────────────────
    InactivityTimeout,
}

/// Payload-free discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    CellularConnected = 0,
    CellularDisconnected = 1,
    BackendConnected = 2,
    BackendDisconnected = 3,
    BackendError = 4,
    AcquisitionStarted = 10,
    AcquisitionActive = 11,
    AcquisitionInactive = 12,
    AcquisitionTimeout = 13,
    AcquisitionFixAvailable = 14,
    AgpsAssistanceNeeded = 15,
    MotionDetected = 20,
    MotionRearmed = 21,
    InactivityTimeout = 30,
}

impl Event {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::CellularConnected => EventKind::CellularConnected,
            Self::CellularDisconnected => EventKind::CellularDisconnected,
            Self::BackendConnected => EventKind::BackendConnected,
            Self::BackendDisconnected => EventKind::BackendDisconnected,
            Self::BackendError(_) => EventKind::BackendError,
            Self::AcquisitionStarted => EventKind::AcquisitionStarted,
            Self::AcquisitionActive => EventKind::AcquisitionActive,
            Self::AcquisitionInactive => EventKind::AcquisitionInactive,
            Self::AcquisitionTimeout => EventKind::AcquisitionTimeout,
            Self::AcquisitionFixAvailable(_) => EventKind::AcquisitionFixAvailable,
            Self::AgpsAssistanceNeeded(_) => EventKind::AgpsAssistanceNeeded,
            Self::MotionDetected(_) => EventKind::MotionDetected,
            Self::MotionRearmed => EventKind::MotionRearmed,
            Self::InactivityTimeout => EventKind::InactivityTimeout,
        }
    }
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CellularConnected => "CellularConnected",
            Self::CellularDisconnected => "CellularDisconnected",
            Self::BackendConnected => "BackendConnected",
            Self::BackendDisconnected => "BackendDisconnected",
            Self::BackendError => "BackendError",
            Self::AcquisitionStarted => "AcquisitionStarted",
            Self::AcquisitionActive => "AcquisitionActive",
            Self::AcquisitionInactive => "AcquisitionInactive",
            Self::AcquisitionTimeout => "AcquisitionTimeout",
            Self::AcquisitionFixAvailable => "AcquisitionFixAvailable",
            Self::AgpsAssistanceNeeded => "AgpsAssistanceNeeded",
            Self::MotionDetected => "MotionDetected",
            Self::MotionRearmed => "MotionRearmed",
            Self::InactivityTimeout => "InactivityTimeout",
        }
    }

    /// Connectivity notifications (feed the connectivity state machine).
    pub const fn is_connectivity(self) -> bool {
        (self as u8) < 10
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Queue
// ═══════════════════════════════════════════════════════════════

/// Anything events can be pushed into.
///
/// Object-safe so that timers and state machines can emit events without
/// knowing the queue's capacity.
pub trait EventPush {
    fn push(&self, event: Event) -> Result<(), QueueError>;
}

/// Bounded multi-producer / single-consumer FIFO of [`Event`]s.
///
/// `push` never blocks and is callable from any context, including timer
/// callbacks and foreign-library threads.  `pop` suspends the single
/// consumer until an event is available.
pub struct EventQueue<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, Event, N>,
    overflows: AtomicU32,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            overflows: AtomicU32::new(0),
        }
    }

    /// Copy `event` into the queue.
    ///
    /// On a full queue the event is dropped, the overflow counter is
    /// incremented and `QueueError::Overflow` is returned.
    pub fn push(&self, event: Event) -> Result<(), QueueError> {
        self.channel.try_send(event).map_err(|_| {
            let dropped = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Event queue full, dropped {} (total dropped: {})",
                event.kind(),
                dropped
            );
            QueueError::Overflow
        })
    }

    /// Wait for the next event.
    pub async fn pop(&self) -> Event {
        self.channel.receive().await
    }

    /// Block the calling thread until the next event is available.
    pub fn pop_blocking(&self) -> Event {
        futures_lite::future::block_on(self.pop())
    }

    /// Take the next event if one is pending.
    pub fn try_pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Total events dropped because the queue was full.
    pub fn overflow_count(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl<const N: usize> EventPush for EventQueue<N> {
    fn push(&self, event: Event) -> Result<(), QueueError> {
        EventQueue::push(self, event)
    }
}

/// Process-wide queue shared by every producer context.
pub static EVENT_QUEUE: EventQueue<EVENT_QUEUE_CAPACITY> = EventQueue::new();

/// Push into [`EVENT_QUEUE`].  Safe from any producer context.
pub fn push_event(event: Event) -> Result<(), QueueError> {
    EVENT_QUEUE.push(event)
}
