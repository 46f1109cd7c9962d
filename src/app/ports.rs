//! Port traits — the hexagonal boundary between the orchestration core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher (domain)
//! ```
//!
//! Device drivers, the backend client and the codec implement these
//! traits.  The [`Dispatcher`](super::dispatcher::Dispatcher) consumes
//! them via generics, so the core never touches hardware directly.
//!
//! Commands flow *out* through these traits.  Notifications flow *in*
//! only as [`Event`](crate::events::Event)s pushed into the event queue
//! by the adapter's own callbacks; no port method ever calls back into
//! the core.

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, CellularError, CodecError, LocationError};
use crate::events::{AgpsRequest, LocationFix, MotionSample};
use crate::outbox::Payload;

// ───────────────────────────────────────────────────────────────
// Location source (GNSS)
// ───────────────────────────────────────────────────────────────

/// Search parameters handed to the location source on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// Search timeout the receiver may apply itself (seconds).
    pub timeout_secs: u32,
    /// Interval between fixes; 0 = single fix.
    pub fix_interval_secs: u32,
}

/// Command side of the GNSS receiver.
///
/// The adapter pushes `AcquisitionActive`, `AcquisitionInactive`,
/// `AcquisitionFixAvailable`, `AcquisitionTimeout` and
/// `AgpsAssistanceNeeded` from its driver callbacks.
pub trait LocationPort {
    /// Begin a search.
    fn start(&mut self, settings: &AcquisitionSettings) -> Result<(), LocationError>;

    /// Abort any running search.  Stopping an idle receiver is not an error.
    fn stop(&mut self) -> Result<(), LocationError>;

    /// Fetch and inject the requested assistance data.
    fn request_assistance(&mut self, request: &AgpsRequest) -> Result<(), LocationError>;
}

// ───────────────────────────────────────────────────────────────
// Cellular modem
// ───────────────────────────────────────────────────────────────

/// Command side of the cellular link.
///
/// The adapter pushes `CellularConnected` / `CellularDisconnected` on
/// network registration changes.
pub trait CellularPort {
    /// Ask the modem to attach to the network.
    fn activate(&mut self) -> Result<(), CellularError>;

    /// Detach from the network (power saving).
    fn deactivate(&mut self) -> Result<(), CellularError>;
}

// ───────────────────────────────────────────────────────────────
// Backend client
// ───────────────────────────────────────────────────────────────

/// Command side of the cloud backend session.
///
/// Reconnect and backoff policy belongs to the implementation.  The
/// adapter pushes `BackendConnected`, `BackendDisconnected` and
/// `BackendError(code)`.
pub trait BackendPort {
    /// Client library's own view of the session (informational only; the
    /// core decides from its connectivity state machine).
    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<(), BackendError>;

    fn disconnect(&mut self) -> Result<(), BackendError>;

    /// One delivery attempt.  The core never retries a failed publish
    /// inside the same call path.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BackendError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator
// ───────────────────────────────────────────────────────────────

/// Status patterns the indicator can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorMode {
    #[default]
    Off,
    /// Slow breathing: booting / idle.
    Glow,
    /// Searching for a fix.
    FastBlink,
    /// Fix acquired.
    Solid,
    Error,
}

/// Fire-and-forget status output.  Never consulted for decisions.
pub trait IndicatorPort {
    fn set_mode(&mut self, mode: IndicatorMode);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch, `None` until the
    /// clock has been synchronised (network time or GNSS).
    fn unix_time_ms(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Device information (boot record)
// ───────────────────────────────────────────────────────────────

/// Identity and health snapshot published once per boot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub imei: heapless::String<16>,
    pub app_version: heapless::String<16>,
    pub battery_mv: u16,
    /// Reference signal received power index reported by the modem.
    pub rsrp: u8,
    /// Wall-clock time of the snapshot (ms since Unix epoch); 0 = unknown.
    pub timestamp_ms: u64,
}

pub trait DeviceInfoPort {
    fn device_info(&mut self) -> DeviceInfo;
}

// ───────────────────────────────────────────────────────────────
// Codec
// ───────────────────────────────────────────────────────────────

/// Pure record encoders.  Implementations hold no state.
pub trait Codec {
    fn encode_motion(&self, sample: &MotionSample) -> Result<Payload, CodecError>;

    fn encode_fix(&self, fix: &LocationFix) -> Result<Payload, CodecError>;

    fn encode_device_info(&self, info: &DeviceInfo) -> Result<Payload, CodecError>;
}

// ───────────────────────────────────────────────────────────────
// Bundle
// ───────────────────────────────────────────────────────────────

/// Every hardware-side port in one bound.
///
/// The dispatcher takes a single `&mut impl DevicePorts` per call instead
/// of one borrow per collaborator.  Blanket-implemented.
pub trait DevicePorts:
    LocationPort + CellularPort + BackendPort + IndicatorPort + ClockPort + DeviceInfoPort
{
}

impl<T> DevicePorts for T where
    T: LocationPort + CellularPort + BackendPort + IndicatorPort + ClockPort + DeviceInfoPort
{
}
